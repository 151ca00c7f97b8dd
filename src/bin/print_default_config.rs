/// Print the default configuration as TOML (starting point for config.toml)
use pivot_monitor::Config;

fn main() -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(&Config::default())?;
    println!("# pivot-monitor configuration");
    println!("# Every key may be overridden with PIVOT_<KEY>, e.g. PIVOT_SYMBOL=QQQ\n");
    print!("{}", rendered);
    Ok(())
}
