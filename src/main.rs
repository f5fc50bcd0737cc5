fn main() -> anyhow::Result<()> {
    clamm_backtest::cli::run()
}
