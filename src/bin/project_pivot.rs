/// Project a chart timestamp onto the next valid session instant
use pivot_monitor::chart::{parse_chart_time, project_timestamp};
use pivot_monitor::time::TradingCalendar;

fn usage() -> anyhow::Error {
    anyhow::anyhow!("usage: project_pivot \"YYYY-MM-DD HH:MM:SS\" <offset-minutes> [--calendar]")
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let raw = args.first().ok_or_else(usage)?;
    let offset: i64 = args.get(1).ok_or_else(usage)?.parse()?;
    let calendar = args
        .iter()
        .any(|a| a == "--calendar")
        .then(TradingCalendar::nyse);

    // Fail loudly here; the library passes bad input through unchanged
    parse_chart_time(raw)?;

    println!("{}", project_timestamp(raw, offset, calendar.as_ref()));
    Ok(())
}
