use chrono::NaiveDate;
use farm_financial_views::*;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

const LABOR_CSV: &str = "\
Week Start Date,Crop,Job Type,Crew,Worker ID,Regular Hours,Overtime Hours,Total Pay ($)
2024-01-01,Strawberry,Picking,A,W1,20,0,200
2024-01-01,Kale,Weeding,A,W2,15,1,300
2024-01-03,Kale,Picking,B,W3,12,0,180
2024-01-04,Kale,Picking,B,W4,8,0,120
2024-01-08,Kale,Packing,A,W1,10,2,250
";

const SALES_CSV: &str = "\
Week Start Date,Crop,Total Sales ($)
2024-01-01,Strawberry,1000
2024-01-01,Kale,\"$1,400.00\"
2024-01-08,Kale,900
";

const HARVEST_CSV: &str = "\
Week Start Date,Crop,Pounds Harvested
2024-01-01,Strawberry,0
2024-01-02,Kale,250
2024-01-05,Kale,50
";

const GL_CSV: &str = "\
Week Start Date,GL Category,Amount ($)
2024-01-01,FICA Taxes,40
2024-01-01,Production Labor Total,800
2024-01-01,Pallets,60
2024-01-01,Stickers,15
2024-01-08,Equipment Lease,500
";

const BUDGET_CSV: &str = "\
Week Start Date,Crew,Total Pay Forecast ($)
2024-01-01,A,400
2024-01-01,C,250
2024-01-08,A,300
";

fn week(m: u32, d: u32) -> Value {
    Value::Week(NaiveDate::from_ymd_opt(2024, m, d).unwrap())
}

fn load_fixture() -> FarmSnapshot {
    load_snapshot(
        LABOR_CSV.as_bytes(),
        SALES_CSV.as_bytes(),
        HARVEST_CSV.as_bytes(),
        GL_CSV.as_bytes(),
        BUDGET_CSV.as_bytes(),
    )
    .expect("fixture CSVs should load")
}

fn number_at(table: &Table, row: usize, field: &str) -> Value {
    table
        .value(row, field)
        .unwrap()
        .unwrap_or_else(|| panic!("row {} missing in {}", row, table.name()))
}

#[test]
fn test_crop_roi_end_to_end() {
    let output = FarmDashboard::default()
        .render("Crop ROI", &load_fixture())
        .unwrap();
    let table = &output.long_form;

    // (w1, Kale), (w1, Strawberry), (w8, Kale)
    assert_eq!(table.len(), 3);

    // Kale week 1: 1400 sales, 600 pay, 300 lb
    assert_eq!(number_at(table, 0, columns::TOTAL_PAY), Value::Number(600.0));
    assert_eq!(
        number_at(table, 0, columns::POUNDS_HARVESTED),
        Value::Number(300.0)
    );
    assert_eq!(
        number_at(table, 0, columns::ROI_PER_LB),
        Value::Number(800.0 / 300.0)
    );

    // Strawberry: harvest recorded as zero pounds, so ROI is undefined
    assert_eq!(number_at(table, 1, columns::TOTAL_SALES), Value::Number(1000.0));
    assert_eq!(number_at(table, 1, columns::TOTAL_PAY), Value::Number(200.0));
    assert_eq!(number_at(table, 1, columns::ROI_PER_LB), Value::Undefined);

    // Kale week 8 has sales and labor but no harvest rows: zero-filled, then undefined
    assert_eq!(
        number_at(table, 2, columns::POUNDS_HARVESTED),
        Value::Number(0.0)
    );
    assert_eq!(number_at(table, 2, columns::ROI_PER_LB), Value::Undefined);

    let mean = defined_mean(table, columns::ROI_PER_LB).unwrap();
    assert_eq!(mean, Some(800.0 / 300.0));
}

#[test]
fn test_single_strawberry_week_has_undefined_roi() {
    let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let snapshot = FarmSnapshot {
        sales: vec![SalesRecord {
            week: day,
            crop: "Strawberry".to_string(),
            total_sales: 1000.0,
        }],
        harvest: vec![HarvestRecord {
            week: day,
            crop: "Strawberry".to_string(),
            pounds_harvested: 0.0,
        }],
        labor: vec![LaborRecord {
            week: day,
            crop: "Strawberry".to_string(),
            job_type: "Picking".to_string(),
            crew: "A".to_string(),
            worker_id: "W1".to_string(),
            regular_hours: 10.0,
            overtime_hours: 0.0,
            total_pay: 200.0,
        }],
        ..Default::default()
    };

    let output = FarmDashboard::default()
        .render("Crop ROI", &snapshot)
        .unwrap();
    let row = &output.long_form.rows().unwrap()[0];

    assert_eq!(
        row[..5].to_vec(),
        vec![
            week(1, 1),
            Value::text("Strawberry"),
            Value::Number(1000.0),
            Value::Number(0.0),
            Value::Number(200.0),
        ]
    );
    assert_eq!(
        output.long_form.value(0, columns::ROI_PER_LB).unwrap(),
        Some(Value::Undefined)
    );
}

#[test]
fn test_labor_budget_variance_by_crew() {
    let output = FarmDashboard::default()
        .render("Labor Budget vs Actual", &load_fixture())
        .unwrap();
    let groups = output.display.as_groups().expect("grouped by crew");

    assert_eq!(groups.len(), 3);

    // Crew A week 1: 500 actual vs 400 forecast
    let crew_a = &groups["A"];
    assert_eq!(number_at(crew_a, 0, columns::TOTAL_PAY), Value::Number(500.0));
    assert_eq!(number_at(crew_a, 0, columns::VARIANCE), Value::Number(100.0));
    assert_eq!(
        number_at(crew_a, 0, columns::UNIQUE_WORKERS),
        Value::Number(2.0)
    );
    assert_eq!(
        number_at(crew_a, 1, columns::OVERTIME_HOURS),
        Value::Number(2.0)
    );

    // Crew B has actual pay but no budget row
    let crew_b = &groups["B"];
    assert_eq!(crew_b.len(), 1);
    assert_eq!(
        number_at(crew_b, 0, columns::TOTAL_PAY_FORECAST),
        Value::Number(0.0)
    );
    assert_eq!(number_at(crew_b, 0, columns::VARIANCE), Value::Number(300.0));

    // Crew C is budgeted but never worked
    let crew_c = &groups["C"];
    assert_eq!(
        number_at(crew_c, 0, columns::UNIQUE_WORKERS),
        Value::Number(0.0)
    );
    assert_eq!(number_at(crew_c, 0, columns::VARIANCE), Value::Number(-250.0));

    // Every row of the long form lands in exactly one crew table
    let grouped_rows: usize = groups.values().map(Table::len).sum();
    assert_eq!(grouped_rows, output.long_form.len());
}

#[test]
fn test_gl_actual_vs_budget() {
    let output = FarmDashboard::default()
        .render("GL Actual vs Budget", &load_fixture())
        .unwrap();
    let table = &output.long_form;

    // Actual: w1 Labor Costs, w1 Materials, w8 Other. Budget: w1 and w8 Labor Costs.
    assert_eq!(table.len(), 5);

    let chart = output.display.as_pivot().expect("pivot");
    assert_eq!(
        chart.columns(),
        &[
            "Labor Costs / Actual".to_string(),
            "Labor Costs / Budget".to_string(),
            "Materials / Actual".to_string(),
            "Other / Actual".to_string(),
        ]
    );

    let w1 = week(1, 1);
    let w8 = week(1, 8);
    assert_eq!(chart.cell(&w1, "Labor Costs / Actual"), Value::Number(840.0));
    assert_eq!(chart.cell(&w1, "Labor Costs / Budget"), Value::Number(650.0));
    assert_eq!(chart.cell(&w1, "Materials / Actual"), Value::Number(75.0));
    assert_eq!(chart.cell(&w8, "Other / Actual"), Value::Number(500.0));

    // Zero-filled where a category has no entry that week
    assert_eq!(chart.cell(&w8, "Materials / Actual"), Value::Number(0.0));
    assert_eq!(chart.get(&w8, "Materials / Actual"), None);

    // Stacking conserves both sides
    assert_eq!(table.sum(columns::AMOUNT).unwrap(), 1415.0 + 950.0);
    assert_eq!(chart.entries().len(), table.len());
}

#[test]
fn test_custom_gl_mapping_from_config() {
    let config = DashboardConfig::from_json_str(
        r#"{
            "gl_mapping": {
                "labels": { "Equipment Lease": "Equipment", "Pallets": "Materials" },
                "default_label": "Unmapped"
            },
            "budget_category_label": "Crew Forecast",
            "budget_high_level_category": "Payroll"
        }"#,
    )
    .unwrap();

    let output = FarmDashboard::new(config)
        .render("gl_actual_vs_budget", &load_fixture())
        .unwrap();
    let chart = output.display.as_pivot().unwrap();

    assert!(chart.columns().contains(&"Equipment / Actual".to_string()));
    assert!(chart.columns().contains(&"Payroll / Budget".to_string()));
    assert_eq!(
        chart.cell(&week(1, 1), "Unmapped / Actual"),
        Value::Number(855.0)
    );
}

#[test]
fn test_labor_cost_by_job_type_pivot() {
    let output = FarmDashboard::default()
        .render("Labor Cost by Job Type", &load_fixture())
        .unwrap();

    let chart = output.display.as_pivot().unwrap();
    assert_eq!(chart.index(), &[week(1, 1), week(1, 8)]);
    assert_eq!(chart.cell(&week(1, 1), "Picking"), Value::Number(500.0));
    assert_eq!(chart.cell(&week(1, 1), "Packing"), Value::Number(0.0));
    assert_eq!(chart.cell(&week(1, 8), "Packing"), Value::Number(250.0));

    let csv = chart.to_csv().unwrap();
    assert!(csv.starts_with("Week Start Date,Packing,Picking,Weeding\n"));
    assert!(csv.contains("2024-01-01,0,500,300\n"));
}

#[test]
fn test_views_only_need_their_sources() {
    let snapshot = load_fixture();
    let all = FarmDashboard::default().source_tables(&snapshot).unwrap();

    for kind in ViewKind::ALL {
        let mut partial = SourceTables::new();
        for source in kind.sources() {
            partial.insert(*source, all.get(*source).unwrap().clone());
        }
        let output = ViewAssembler::new(&DashboardConfig::default()).assemble_view(kind, &partial);
        assert!(output.is_ok(), "{} failed with only its sources", kind);
    }

    let labor_only = SourceTables::new().with(Source::Labor, all.get(Source::Labor).unwrap().clone());
    assert!(matches!(
        assemble("Crop ROI", &labor_only),
        Err(FarmViewsError::MissingSource(Source::Sales))
    ));
}

#[test]
fn test_unknown_view_name() {
    let tables = FarmDashboard::default()
        .source_tables(&load_fixture())
        .unwrap();
    let result = assemble("Soil Moisture", &tables);
    assert!(matches!(result, Err(FarmViewsError::UnknownView(name)) if name == "Soil Moisture"));
}

#[test]
fn test_recomputing_gives_identical_views() {
    let dashboard = FarmDashboard::default();
    let snapshot = load_fixture();

    let first = dashboard.render_all(&snapshot).unwrap();
    let second = dashboard.render_all(&snapshot).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_load_snapshot_from_files() {
    let dir: PathBuf = std::env::temp_dir().join(format!(
        "farm_financial_views_{}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).unwrap();

    let files = SnapshotFiles::in_dir(&dir);
    for (path, body) in [
        (&files.labor, LABOR_CSV),
        (&files.sales, SALES_CSV),
        (&files.harvest, HARVEST_CSV),
        (&files.gl, GL_CSV),
        (&files.budget, BUDGET_CSV),
    ] {
        let mut file = File::create(path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
    }

    let snapshot = files.load().unwrap();
    assert_eq!(snapshot, load_fixture());
    assert_eq!(snapshot.total_records(), 5 + 3 + 3 + 5 + 3);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_markdown_report_shows_undefined() {
    let output = FarmDashboard::default()
        .render("Crop ROI", &load_fixture())
        .unwrap();
    let markdown = output.long_form.to_markdown().unwrap();

    assert!(markdown.contains("## Crop ROI"));
    assert!(markdown.contains("| 2024-01-01 | Strawberry | 1000.00 | 0.00 | 200.00 | 800.00 | n/a |"));
}
