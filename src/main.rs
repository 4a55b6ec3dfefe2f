use clap::Parser;
use miette::Result;
use sgm::cli::{Cli, Commands, GlobalOpts};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_tracing(&global);

    match cli.command {
        Commands::List(args) => sgm::cli::commands::list::run(args, &global),
        Commands::Info(args) => sgm::cli::commands::info::run(args, &global),
        Commands::Copy(args) => sgm::cli::commands::transfer::run_copy(args, &global),
        Commands::Move(args) => sgm::cli::commands::transfer::run_move(args, &global),
        Commands::Delete(args) => sgm::cli::commands::transfer::run_delete(args, &global),
        Commands::Trim(args) => sgm::cli::commands::transfer::run_trim(args, &global),
        Commands::Cache(cmd) => sgm::cli::commands::cache::run(cmd, &global),
        Commands::Config(cmd) => sgm::cli::commands::config::run(cmd, &global),
    }
}

/// Log to stderr, filtered by `SGM_LOG` (default: warn, or debug with -v)
fn init_tracing(global: &GlobalOpts) {
    let fallback = if global.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("SGM_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
