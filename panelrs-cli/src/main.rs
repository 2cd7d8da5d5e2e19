fn main() -> anyhow::Result<()> {
    panelrs_cli::run()
}
