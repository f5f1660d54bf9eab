//! Command-line entry point of the download benchmark.

fn main() -> anyhow::Result<()> {
    bucketbench::cli::execute()
}
