use clap::Parser;
use std::process::ExitCode;
use thread_watch::logging;
use thread_watch::results::PageResult;
use thread_watch::{Backend, ThreadWatch};
use tokio_util::sync::CancellationToken;

mod args;
use args::{Args, convert_backend};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command-line arguments
    let args = Args::parse();

    // Defaults, then the config file, then the environment, then flags
    let watch = match &args.config {
        Some(path) => ThreadWatch::with_config_file(path),
        None => Ok(ThreadWatch::new()),
    }
    .and_then(ThreadWatch::with_env)
    .map(|watch| {
        watch
            .with_start_page(args.start_page)
            .with_backend(convert_backend(args.backend))
    });

    let watch = match watch {
        Ok(watch) => watch,
        Err(e) => {
            logging::init_stderr();
            ::log::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging once the log file setting is known
    if let Err(e) = logging::init(&watch.config()) {
        ::log::error!("Cannot open log file: {}", e);
        return ExitCode::FAILURE;
    }

    if watch.config().backend == Backend::WebDriver {
        println!("Note: the webdriver backend requires a WebDriver server (e.g., ChromeDriver).");
        println!("Set WEBDRIVER_URL if not using the default http://localhost:4444");
    }

    let shutdown = CancellationToken::new();
    let (mut monitor, mut state) = match watch.build(shutdown.clone()) {
        Ok(built) => built,
        Err(e) => {
            ::log::error!("Failed to start monitor: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ::log::info!("Interrupt received");
            signal_token.cancel();
        }
    });

    if args.test {
        let page = state.current_page;
        return match monitor.check_once(page).await {
            Ok(result) => {
                print_result(page, &result);
                ExitCode::SUCCESS
            }
            Err(e) => {
                ::log::error!("Check of page {} failed: {}", page, e);
                ExitCode::FAILURE
            }
        };
    }

    monitor.run(&mut state).await;
    ExitCode::SUCCESS
}

fn print_result(page: u32, result: &PageResult) {
    println!(
        "Page {}: {:?}, {} comments on page, {} matching",
        page,
        result.status,
        result.total_on_page,
        result.comments.len()
    );
    for comment in &result.comments {
        println!("\n[{}] {} at {}", comment.id, comment.author, comment.timestamp);
        println!("{}", comment.rendered_body());
        println!("{}", comment.canonical_link);
    }
}
