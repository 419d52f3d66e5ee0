use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::process::{self, ExitCode};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::executor::block_on;
use indoc::indoc;
use thiserror::Error;

use popup_overlay::boot::{self, BootDecision};
use popup_overlay::clipboard::{self, ClipboardError, SystemClipboard};
use popup_overlay::config::{ConfigError, OverlayConfig, Paths};
use popup_overlay::constants::{PICKER_URI, SHEET_EMPTY_MESSAGE};
use popup_overlay::control::{ControlCommand, DriverFactory, OverlayControl};
use popup_overlay::drivers::console::{
    ConsoleInputDriver, ConsoleOutputDriver, ConsoleScreen, ConsoleSystem, UriNavigation,
    screen_for_terminal,
};
use popup_overlay::drivers::{HostDrivers, OutputDriver};
use popup_overlay::permissions::PermissionGate;
use popup_overlay::picker::{self, PickTarget, PickerError, PickerLock};
use popup_overlay::prefs::{Preferences, PrefsError};
use popup_overlay::runner::{ConsoleHost, Exit};
use popup_overlay::store::{AppItemStore, ServiceStore, StoreError};
use popup_overlay::tracing_sub;

#[derive(Parser, Debug)]
#[command(
    name = "popup-overlay",
    version = env!("CARGO_PKG_VERSION"),
    about = "A floating bubble that copies saved snippets to the clipboard",
    after_help = indoc! {"
        Run `popup-overlay serve` in a spare terminal. Click the bubble to pick
        an item, drag it to move it. `popup-overlay stop` from another shell
        shuts the overlay down; `popup-overlay boot` brings it back if it was
        running when the machine went down. `popup-overlay register-picker`
        sends bubble taps to `popup-overlay pick` instead of the built-in sheet.
    "}
)]
struct Cli {
    /// Directory holding the item stores, settings and log file.
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Configuration file (JSON).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the overlay host in this terminal.
    Serve,
    /// Stop a running host and disable the overlay.
    Stop,
    /// Ask a running host to open the picker.
    OpenPicker,
    /// Start the host only if it was enabled and permissions still allow it.
    Boot,
    /// The "display over other apps" permission.
    Permission {
        #[command(subcommand)]
        action: PermissionAction,
    },
    /// The notification permission.
    Notifications {
        #[command(subcommand)]
        action: NotificationAction,
    },
    /// Edit the saved items.
    Items {
        #[command(subcommand)]
        action: ItemsAction,
    },
    /// Pick an item and copy it to the clipboard.
    Pick {
        /// 1-based item number or the hand-off URI; prompts unless a number
        /// is given.
        target: Option<String>,
    },
    /// Route the bubble's hand-off URI to `pick` and turn the hand-off on.
    RegisterPicker {
        /// Where to write the desktop entry (default: the user's
        /// applications directory).
        #[arg(long, value_name = "DIR")]
        apps_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum PermissionAction {
    Check,
    Request,
    Revoke,
}

#[derive(Subcommand, Debug)]
enum NotificationAction {
    Check,
    Grant,
    Revoke,
}

#[derive(Subcommand, Debug)]
enum ItemsAction {
    List,
    Add {
        label: String,
        #[arg(default_value = "")]
        value: String,
    },
    Edit {
        id: String,
        label: String,
        #[arg(default_value = "")]
        value: String,
    },
    Remove {
        id: String,
    },
    /// Print the overlay's replica as JSON.
    Get,
    /// Replace the overlay's replica with a JSON array (`-` reads stdin).
    Set {
        json: String,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Prefs(#[from] PrefsError),
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("permission to display over other apps was not granted")]
    OverlayPermissionDenied,
    #[error("the overlay host could not start in the foreground")]
    StartFailed,
    #[error(transparent)]
    Picker(#[from] PickerError),
    #[error("no applications directory available; pass --apps-dir")]
    NoAppsDir,
    #[error("no config file location available; pass --config")]
    NoConfigPath,
    #[error("no item with id {0}")]
    NotFound(String),
    #[error("host replied: {0}")]
    Control(String),
    #[error("no overlay host is running")]
    NotRunning,
}

struct Context {
    paths: Paths,
    config: OverlayConfig,
    config_path: Option<PathBuf>,
}

impl Context {
    fn load(cli: &Cli) -> Result<Self, CliError> {
        let paths = Paths::resolve(cli.data_dir.clone())?;
        paths.ensure_data_dir()?;
        let config_path = cli.config.clone().or_else(OverlayConfig::default_path);
        let config = match &config_path {
            Some(path) => OverlayConfig::load(path)?,
            None => OverlayConfig::default(),
        };
        Ok(Self {
            paths,
            config,
            config_path,
        })
    }

    fn system(&self) -> ConsoleSystem {
        ConsoleSystem::new(
            Preferences::open(&self.paths.system_settings),
            self.config.sdk_level,
        )
    }

    fn service_store(&self) -> ServiceStore {
        ServiceStore::open(&self.paths.service_prefs)
    }

    fn app_store(&self) -> AppItemStore<ServiceStore> {
        AppItemStore::open(&self.paths.app_prefs, self.service_store())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("popup-overlay: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let ctx = Context::load(&cli)?;
    match cli.command {
        Command::Serve => serve(&ctx, true),
        Command::Stop => stop(&ctx),
        Command::OpenPicker => send_command(&ctx, ControlCommand::OpenPicker),
        Command::Boot => boot_restore(&ctx),
        Command::Permission { action } => permission(&ctx, action),
        Command::Notifications { action } => notifications(&ctx, action),
        Command::Items { action } => items(&ctx, action),
        Command::Pick { target } => pick(&ctx, PickTarget::parse(target.as_deref())?),
        Command::RegisterPicker { apps_dir } => register_picker(&ctx, apps_dir),
    }
}

fn serve(ctx: &Context, prompt: bool) -> Result<(), CliError> {
    tracing_sub::init(Some(&ctx.paths.log_file), ctx.config.debug);

    let system = ctx.system();
    let gate = PermissionGate::new(system.clone());
    if !gate.check_can_draw_overlay() && prompt {
        gate.request_can_draw_overlay();
    }
    if !gate.check_can_draw_overlay() {
        return Err(CliError::OverlayPermissionDenied);
    }
    if !gate.check_notifications_granted() {
        eprintln!(
            "popup-overlay: notifications are off; run `popup-overlay notifications grant` so the overlay survives a restart"
        );
    }

    let mut output = ConsoleOutputDriver::new()?;
    let (cols, rows) = output.size()?;
    let screen = ConsoleScreen::new(screen_for_terminal(cols, rows));

    let factory: DriverFactory = {
        let screen = screen.clone();
        let system = Arc::new(system);
        Arc::new(move || HostDrivers {
            system: system.clone(),
            windows: Box::new(screen.windows()),
            clipboard: Box::new(SystemClipboard::new()),
            navigation: Box::new(UriNavigation),
            toasts: Box::new(screen.toasts()),
            notifications: Box::new(screen.notifications()),
        })
    };
    let mut control = OverlayControl::new(factory, ctx.service_store(), ctx.config.clone());
    if !block_on(control.start()) {
        return Err(CliError::StartFailed);
    }

    #[cfg(unix)]
    let (_listener, commands) = match popup_overlay::ipc::listen(&ctx.paths.socket) {
        Ok((listener, commands)) => (Some(listener), Some(commands)),
        Err(err) => {
            tracing::warn!("control socket unavailable, `stop` will not reach this host: {err}");
            (None, None)
        }
    };
    #[cfg(not(unix))]
    let commands = None;

    let mut host = ConsoleHost::new(screen, control, ctx.config.clone(), commands);
    output.enter()?;
    let result = host.run(ConsoleInputDriver::new(), &mut output);
    output.exit()?;

    match result? {
        Exit::Stopped => {
            block_on(host.control().stop());
            tracing::info!("stopped on request");
        }
        Exit::Closed => tracing::info!("terminal host closed; overlay stays enabled"),
        Exit::HostGone => tracing::warn!("overlay host exited"),
    }
    Ok(())
}

#[cfg(unix)]
fn send_command(ctx: &Context, command: ControlCommand) -> Result<(), CliError> {
    match popup_overlay::ipc::send(&ctx.paths.socket, command) {
        Ok(reply) if reply == "ok" => Ok(()),
        Ok(reply) => Err(CliError::Control(reply)),
        Err(_) => Err(CliError::NotRunning),
    }
}

#[cfg(not(unix))]
fn send_command(_ctx: &Context, _command: ControlCommand) -> Result<(), CliError> {
    Err(CliError::NotRunning)
}

fn stop(ctx: &Context) -> Result<(), CliError> {
    match send_command(ctx, ControlCommand::Stop) {
        Ok(()) => println!("stopped"),
        Err(CliError::NotRunning) => {
            // nothing to tear down; just keep it from coming back on boot
            ctx.service_store().set_enabled(false)?;
            println!("not running; overlay disabled");
        }
        Err(err) => return Err(err),
    }
    Ok(())
}

fn boot_restore(ctx: &Context) -> Result<(), CliError> {
    let gate = PermissionGate::new(ctx.system());
    match boot::decide(ctx.service_store().enabled(), &gate) {
        BootDecision::Start => serve(ctx, false),
        BootDecision::Disabled => {
            println!("overlay is disabled; nothing to restore");
            Ok(())
        }
        BootDecision::OverlayPermissionMissing => {
            println!("overlay permission was revoked; not restoring");
            Ok(())
        }
        BootDecision::NotificationPermissionMissing => {
            println!("notification permission was revoked; not restoring");
            Ok(())
        }
    }
}

fn granted(yes: bool) -> &'static str {
    if yes { "granted" } else { "denied" }
}

fn permission(ctx: &Context, action: PermissionAction) -> Result<(), CliError> {
    let system = ctx.system();
    match action {
        PermissionAction::Check => {}
        PermissionAction::Request => {
            PermissionGate::new(system.clone()).request_can_draw_overlay()
        }
        PermissionAction::Revoke => system.set_overlay_allowed(false)?,
    }
    let allowed = PermissionGate::new(system).check_can_draw_overlay();
    println!("{}", granted(allowed));
    Ok(())
}

fn notifications(ctx: &Context, action: NotificationAction) -> Result<(), CliError> {
    let system = ctx.system();
    match action {
        NotificationAction::Check => {}
        NotificationAction::Grant => system.set_notifications_allowed(true)?,
        NotificationAction::Revoke => system.set_notifications_allowed(false)?,
    }
    let allowed = PermissionGate::new(system).check_notifications_granted();
    println!("{}", granted(allowed));
    Ok(())
}

fn items(ctx: &Context, action: ItemsAction) -> Result<(), CliError> {
    let store = ctx.app_store();
    match action {
        ItemsAction::List => {
            let list = store.load()?;
            if list.is_empty() {
                println!("no saved items");
            }
            for (index, item) in list.iter().enumerate() {
                println!("{:>3}  {}  {}", index + 1, item.id, item.display(index));
            }
        }
        ItemsAction::Add { label, value } => println!("{}", store.add(&label, &value)?.id),
        ItemsAction::Edit { id, label, value } => store.update(&id, &label, &value)?,
        ItemsAction::Remove { id } => {
            if !store.remove(&id)? {
                return Err(CliError::NotFound(id));
            }
        }
        ItemsAction::Get => println!("{}", store.exchange().items_json()),
        ItemsAction::Set { json } => {
            let raw = if json == "-" {
                let mut raw = String::new();
                io::stdin().read_to_string(&mut raw)?;
                raw
            } else {
                json
            };
            store.exchange().set_items_json(&raw)?;
        }
    }
    Ok(())
}

fn pick(ctx: &Context, target: PickTarget) -> Result<(), CliError> {
    let mut lock = PickerLock::open(&ctx.paths.picker_lock)?;
    let guard = lock.try_hold()?;
    let list = ctx.app_store().resync()?;
    if list.is_empty() {
        println!("{SHEET_EMPTY_MESSAGE}");
        return Ok(());
    }

    let choice = match target {
        PickTarget::Index(n) => n.to_string(),
        PickTarget::Prompt => {
            for (i, item) in list.iter().enumerate() {
                println!("{:>3}  {}", i + 1, item.display(i));
            }
            print!("item> ");
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            line
        }
    };
    let position = picker::position(&choice, list.len())?;
    // another picker may open while this one keeps the selection alive
    drop(guard);

    let item = &list[position];
    println!("Copied: {}", item.display_label(position));
    if cfg!(target_os = "linux") {
        eprintln!("(keeping the clipboard until something else is copied)");
    }
    clipboard::set(item.clip_text())?;
    Ok(())
}

fn register_picker(ctx: &Context, apps_dir: Option<PathBuf>) -> Result<(), CliError> {
    let apps_dir = apps_dir
        .or_else(|| dirs::data_dir().map(|dir| dir.join("applications")))
        .ok_or(CliError::NoAppsDir)?;
    let config_path = ctx.config_path.clone().ok_or(CliError::NoConfigPath)?;
    let exe = std::env::current_exe()?;
    let entry = picker::register(&apps_dir, &exe)?;
    println!("wrote {}", entry.display());

    let mime = format!("x-scheme-handler/{}", picker::URI_SCHEME);
    match process::Command::new("xdg-mime")
        .args(["default", picker::DESKTOP_FILE, &mime])
        .status()
    {
        Ok(status) if status.success() => {}
        Ok(status) => eprintln!("popup-overlay: xdg-mime exited with {status}"),
        Err(err) => eprintln!("popup-overlay: could not run xdg-mime: {err}"),
    }

    let config = OverlayConfig {
        picker_uri: Some(PICKER_URI.to_owned()),
        ..ctx.config.clone()
    };
    config.save(&config_path)?;
    println!("hand-off enabled in {}", config_path.display());
    Ok(())
}
