use clap::Parser;
use miette::Result;
use tracing_subscriber::EnvFilter;

use drawscan::cli::{Cli, Commands, GlobalOpts};

fn init_logging(global: &GlobalOpts) {
    let default_level = if global.verbose {
        "drawscan=debug"
    } else if global.quiet {
        "error"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    // Reset SIGPIPE so piping to `head` terminates quietly instead of panicking
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
    init_logging(&global);

    match cli.command {
        Commands::Scan(args) => drawscan::cli::commands::scan::run(args, &global),
        Commands::Analyze(args) => drawscan::cli::commands::analyze::run(args, &global),
        Commands::Drawing(args) => drawscan::cli::commands::drawing::run(args, &global),
        Commands::Match(args) => drawscan::cli::commands::match_components::run(args, &global),
        Commands::Reconcile(args) => drawscan::cli::commands::reconcile::run(args, &global),
        Commands::Completions(args) => drawscan::cli::commands::completions::run(args),
    }
}
