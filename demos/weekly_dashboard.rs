use farm_financial_views::{load_snapshot, DashboardConfig, FarmDashboard, ViewDisplay};

const LABOR: &str = "\
Week Start Date,Crop,Job Type,Crew,Worker ID,Regular Hours,Overtime Hours,Total Pay ($)
2024-03-04,Strawberry,Picking,A,W1,38,2,820
2024-03-05,Strawberry,Picking,A,W2,40,0,760
2024-03-06,Kale,Weeding,B,W3,30,0,540
2024-03-11,Kale,Packing,B,W3,36,4,790
2024-03-12,Strawberry,Picking,A,W1,40,5,960
";

const SALES: &str = "\
Week Start Date,Crop,Total Sales ($)
2024-03-04,Strawberry,\"$4,200.00\"
2024-03-07,Kale,1100
2024-03-13,Strawberry,3900
2024-03-14,Kale,1650
";

const HARVEST: &str = "\
Week Start Date,Crop,Pounds Harvested
2024-03-05,Strawberry,1400
2024-03-06,Kale,0
2024-03-12,Strawberry,1250
2024-03-13,Kale,600
";

const GL: &str = "\
Week Start Date,GL Category,Amount ($)
2024-03-04,Production Labor Total,2120
2024-03-04,FICA Taxes,162
2024-03-04,Pallets,240
2024-03-11,Production Labor Total,1750
2024-03-11,Line Propane,310
2024-03-11,Insurance,450
";

const BUDGET: &str = "\
Week Start Date,Crew,Total Pay Forecast ($)
2024-03-04,A,1500
2024-03-04,B,600
2024-03-11,A,1500
2024-03-11,C,400
";

fn main() -> anyhow::Result<()> {
    let snapshot = load_snapshot(
        LABOR.as_bytes(),
        SALES.as_bytes(),
        HARVEST.as_bytes(),
        GL.as_bytes(),
        BUDGET.as_bytes(),
    )?;

    let config = DashboardConfig {
        farm_name: "Hillside Farm".to_string(),
        ..Default::default()
    };
    let dashboard = FarmDashboard::try_new(config)?;

    println!("Loaded {} records", snapshot.total_records());

    for (kind, output) in dashboard.render_all(&snapshot)? {
        println!("{}", output.long_form.to_markdown()?);

        match &output.display {
            ViewDisplay::Pivot(chart) => {
                println!("{} chart ({} weeks x {} series):", kind, chart.len(), chart.columns().len());
                println!("{}", chart.to_csv()?);
            }
            ViewDisplay::ByGroup(groups) => {
                for table in groups.values() {
                    println!("{}", table.to_markdown()?);
                }
            }
        }
    }

    Ok(())
}
