use anyhow::Result;

fn main() -> Result<()> {
    crcheck::cli::run(crcheck::cli::CliMode::Msgque)
}
