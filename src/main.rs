use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use robot_hub_console::config::{self, Config};
use robot_hub_console::demo::{self, DemoAction, Feedback, Tone};
use robot_hub_console::metrics;
use robot_hub_console::views::{robot_id_from_href, Pane, RobotListView};
use robot_hub_console::{DetailSession, HubClient, HubError, HubResult, SessionOptions};

#[derive(Debug, Parser)]
#[command(name = "robot-hub")]
#[command(about = "Monitor and tele-operate robots through a robot hub backend")]
struct App {
    /// Backend origin (overrides ROBOT_HUB_URL)
    #[arg(long, global = true)]
    url: Option<String>,
    /// Status poll interval in milliseconds
    #[arg(long, global = true)]
    interval_ms: Option<u64>,
    /// Do not draw perception boxes
    #[arg(long, global = true)]
    no_overlay: bool,
    /// Disable the point-cloud visualizer pane
    #[arg(long, global = true)]
    no_visualizer: bool,
    /// Video display box as WxH (defaults to the first frame's size)
    #[arg(long, global = true)]
    display_size: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List registered robots with their online status
    Robots,
    /// Print a robot's detail view once
    Show {
        /// Robot id or a `/robot?id=...` link
        robot: String,
    },
    /// Open a live session; read actions and pane switches from stdin
    Watch {
        /// Robot id or a `/robot?id=...` link
        robot: String,
        /// Redraw period in milliseconds
        #[arg(long, default_value = "1000")]
        refresh_ms: u64,
        /// Print Prometheus metrics on exit
        #[arg(long)]
        metrics: bool,
    },
    /// Trigger one demo action
    Demo {
        /// Robot id or a `/robot?id=...` link
        robot: String,
        /// Action name, e.g. stand, sit, wiggle, poweron
        action: String,
    },
    /// Start the fleet demo for a robot kind
    DemoStart { kind: String },
    /// Stop the fleet demo
    DemoStop,
    /// Print a robot's battery state
    Battery { robot: String },
    /// Ask the backend to launch its visualizer process
    LaunchVisualizer { robot: String },
}

impl App {
    fn config(&self) -> HubResult<Config> {
        let mut config = Config::load()?;
        if let Some(url) = &self.url {
            config.base_url = config::parse_base_url(url)?;
        }
        if let Some(ms) = self.interval_ms {
            config.status_interval = Duration::from_millis(ms);
        }
        if self.no_overlay {
            config.overlay = false;
        }
        if self.no_visualizer {
            config.visualizer = false;
        }
        if let Some(size) = &self.display_size {
            config.display_size = Some(config::parse_size(size)?);
        }
        Ok(config)
    }
}

/// Accept either a bare id or a detail page link.
fn robot_id(target: &str) -> String {
    robot_id_from_href(target).unwrap_or_else(|| target.to_string())
}

/// Print a reply's feedback line; error tone means a failed command.
fn report(feedback: &Feedback) -> ExitCode {
    match feedback.tone {
        Tone::Success => {
            println!("{}", feedback.text);
            ExitCode::SUCCESS
        }
        Tone::Error => {
            eprintln!("{}", feedback.text);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    metrics::register_metrics();

    let app = App::parse();
    match run(app).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(app: App) -> HubResult<ExitCode> {
    let config = app.config()?;
    let client = HubClient::new(&config)?;
    tracing::debug!("using backend {}", config.base_url);

    match app.command {
        Commands::Robots => {
            let mut view = RobotListView::new();
            view.load(&client).await?;
            print!("{}", view.render());
        }
        Commands::Show { robot } => {
            let mut options = SessionOptions::from(&config);
            // A one-shot print has no use for the video probe.
            options.display_size = options.display_size.or(Some((960, 540)));
            let session = DetailSession::open(client, &robot_id(&robot), options).await?;
            let wait = config.request_timeout + Duration::from_secs(1);
            if !session.first_status(wait).await {
                tracing::warn!("no status reply within {wait:?}");
            }
            print!("{}", session.render());
            session.teardown().await;
        }
        Commands::Watch {
            robot,
            refresh_ms,
            metrics: print_metrics,
        } => {
            let session =
                DetailSession::open(client, &robot_id(&robot), SessionOptions::from(&config))
                    .await?;
            watch(session, Duration::from_millis(refresh_ms.max(50))).await;
            if print_metrics {
                print!("{}", metrics::gather_metrics());
            }
        }
        Commands::Demo { robot, action } => {
            if action.parse::<DemoAction>().is_err() {
                tracing::warn!("'{action}' is not a known demo action; sending it anyway");
            }
            let feedback = demo::dispatch(&client, &robot_id(&robot), &action).await;
            return Ok(report(&feedback));
        }
        Commands::DemoStart { kind } => {
            return Ok(report(&Feedback::from_reply(&client.start_demo(&kind).await?)));
        }
        Commands::DemoStop => {
            return Ok(report(&Feedback::from_reply(&client.stop_demo().await?)));
        }
        Commands::Battery { robot } => {
            let battery = client.battery(&robot_id(&robot)).await?;
            let pretty = serde_json::to_string_pretty(&battery).map_err(HubError::Decode)?;
            println!("{pretty}");
        }
        Commands::LaunchVisualizer { robot } => {
            let reply = client.launch_visualizer(&robot_id(&robot)).await?;
            return Ok(report(&Feedback::from_reply(&reply)));
        }
    }
    Ok(ExitCode::SUCCESS)
}

const WATCH_HELP: &str = "commands: <action> | camera | viz | resize WxH | status | actions | quit";

/// Interactive loop: redraw periodically, take commands from stdin.
async fn watch(mut session: DetailSession, refresh: Duration) {
    println!("{WATCH_HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(refresh);
    let mut last = String::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let frame = session.render();
                if frame != last {
                    print!("{frame}");
                    last = frame;
                }
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("stdin read failed: {e}");
                        break;
                    }
                };
                let mut words = line.split_whitespace();
                match words.next() {
                    None => {}
                    Some("quit" | "exit") => break,
                    Some("camera") => {
                        let _ = session.show_pane(Pane::Camera);
                    }
                    Some("viz" | "visualizer") => {
                        if let Err(e) = session.show_pane(Pane::Visualizer) {
                            eprintln!("{e}");
                        }
                    }
                    Some("resize") => match words.next().map(config::parse_size) {
                        Some(Ok((w, h))) => session.resize_viewport(w, h),
                        Some(Err(e)) => eprintln!("{e}"),
                        None => eprintln!("usage: resize WxH"),
                    },
                    Some("status") => print!("{}", session.render()),
                    Some("actions") => {
                        let names: Vec<&str> = DemoAction::ALL.iter().map(|a| a.as_str()).collect();
                        println!("{}", names.join(" "));
                    }
                    Some("help") => println!("{WATCH_HELP}"),
                    Some(action) => {
                        // Not awaited: overlapping requests are allowed.
                        session.spawn_demo(action.to_string());
                    }
                }
            }
        }
    }
    session.teardown().await;
}
