/// deskbridge desktop shell
/// Tauri host for the sandboxed shell UI.
///
/// Module structure:
/// - commands: Tauri IPC handlers, one per bridge capability
/// - window_host: website windows as Tauri webview windows
/// - subscriptions: stream subscriptions held on behalf of the webview
///
/// The host is built before the app so a broken configuration stops
/// startup instead of producing a UI with a half-working bridge.

mod commands;
mod subscriptions;
mod window_host;

use deskbridge::capabilities::{self, WEBSITE_CLOSED_EVENT, WEBSITE_OPENED_EVENT};
use deskbridge::system::ExitHook;
use deskbridge::websites::WindowHandle;
use deskbridge::{Bridge, BridgeConfig, Host};
use std::sync::Arc;
use subscriptions::Subscriptions;
use tauri::ipc::Invoke;
use tauri::{AppHandle, Emitter, Manager, RunEvent, Runtime, WindowEvent};
use window_host::{AppSlot, TauriWindowHost};

/// Refuse any invoke whose command is not a registered bridge channel.
fn gate<R: Runtime>(
    handler: impl Fn(Invoke<R>) -> bool + Send + Sync + 'static,
) -> impl Fn(Invoke<R>) -> bool + Send + Sync + 'static {
    move |invoke| {
        let command = invoke.message.command().to_string();
        if !capabilities::is_exposed(&command) {
            log::warn!("[Bridge] Rejected invoke of unexposed command {command}");
            invoke
                .resolver
                .reject(format!("command {command} is not exposed"));
            return true;
        }
        handler(invoke)
    }
}

/// Re-broadcast website open/close notifications as global events.
fn forward_website_events(app: &AppHandle, bridge: &Bridge) {
    let emitter = app.clone();
    let _ = bridge.websites().on_opened(Box::new(move |event| {
        if let Err(e) = emitter.emit(WEBSITE_OPENED_EVENT, event.clone()) {
            log::warn!("[Websites] Failed to emit opened event: {e}");
        }
    }));

    let emitter = app.clone();
    let _ = bridge.websites().on_closed(Box::new(move |event| {
        if let Err(e) = emitter.emit(WEBSITE_CLOSED_EVENT, event.clone()) {
            log::warn!("[Websites] Failed to emit closed event: {e}");
        }
    }));
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let config = match BridgeConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("deskbridge: {e}");
            std::process::exit(1);
        }
    };

    let app_slot: AppSlot = Arc::default();
    let exit_slot = app_slot.clone();
    let exit_hook: ExitHook = Arc::new(move || match exit_slot.get() {
        Some(app) => app.exit(0),
        None => std::process::exit(0),
    });

    let window_host = Arc::new(TauriWindowHost::new(app_slot.clone()));
    let host = match Host::start(config.clone(), window_host, exit_hook) {
        Ok(host) => Arc::new(host),
        Err(e) => {
            eprintln!("deskbridge: host failed to start: {e}");
            std::process::exit(1);
        }
    };

    let bridge = host.bridge();
    let host_for_windows = host.clone();
    let host_for_shutdown = host.clone();
    let log_level = config.log_level_filter();
    let log_in_release = config.log_in_release;

    tauri::Builder::default()
        .manage(bridge.clone())
        .manage(Subscriptions::default())
        .setup(move |app| {
            if cfg!(debug_assertions) || log_in_release {
                app.handle().plugin(
                    tauri_plugin_log::Builder::default()
                        .level(log_level)
                        .build(),
                )?;
            }
            let _ = app_slot.set(app.handle().clone());
            forward_website_events(app.handle(), &bridge);
            Ok(())
        })
        .on_window_event(move |window, event| {
            if let WindowEvent::Destroyed = event {
                host_for_windows.window_closed(&WindowHandle(window.label().to_string()));
            }
        })
        .invoke_handler(gate(tauri::generate_handler![
            commands::terminal::terminal_run,
            commands::terminal::terminal_kill,
            commands::terminal::terminal_write,
            commands::terminal::terminal_resize,
            commands::terminal::terminal_on_data,
            commands::terminal::terminal_on_exit,
            commands::terminal::terminal_unsubscribe,
            commands::filesystem::fs_read_file,
            commands::filesystem::fs_write_file,
            commands::filesystem::fs_list_dir,
            commands::processes::processes_list,
            commands::processes::processes_kill,
            commands::websites::websites_detect_urls,
            commands::websites::websites_open,
            commands::websites::websites_close,
            commands::system::system_get_info,
            commands::system::system_exit,
            commands::system::system_ping,
        ]))
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(move |app_handle, event| {
            if let RunEvent::Exit = event {
                // Kill every shell the UI started before the process goes.
                log::info!("App shutting down - cleaning up terminal sessions");
                app_handle.state::<Subscriptions>().clear();
                host_for_shutdown.shutdown();
            }
        });
}
