//! `install` / `uninstall` / `configure` subcommands ( CLI surface),
//! grounded in the original's `ServiceManager`.

use std::io;
use std::process::Command;

const CONF_DIR: &str = "/etc/alpamon";
const CONF_FILE: &str = "/etc/alpamon/alpamon.conf";
const TMPFILE_UNIT: &str = "/usr/lib/tmpfiles.d/alpamon.conf";
const SERVICE_UNIT: &str = "/lib/systemd/system/alpamon.service";
const DEFAULT_EDITOR: &str = "vi";

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn config_template() -> String {
    format!(
        "[server]\nurl = {}\nid = {}\nkey = {}\n\n[ssl]\nverify = {}\nca_cert = {}\n\n[logging]\ndebug = {}\n",
        env_or("ALPACON_URL", "https://alpacon.io"),
        env_or("ALPAMON_ID", ""),
        env_or("ALPAMON_KEY", ""),
        env_or("ALPACON_SSL_VERIFY", "true"),
        env_or("ALPACON_CA_CERT", ""),
        env_or("ALPAMON_DEBUG", "true"),
    )
}

fn service_unit() -> String {
    let exec_start = std::env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "/usr/local/bin/alpamon".to_string());
    format!(
        "[Unit]\nDescription=Alpamon Agent\nAfter=network-online.target\nWants=network-online.target\n\n[Service]\nType=simple\nExecStart={exec_start}\nRestart=always\nRestartSec=5\n\n[Install]\nWantedBy=multi-user.target\n",
    )
}

fn write_config_if_absent() -> io::Result<()> {
    if !std::path::Path::new(CONF_FILE).exists() {
        std::fs::write(CONF_FILE, config_template())?;
    }
    Ok(())
}

fn run(cmd: &str, args: &[&str]) {
    match Command::new(cmd).args(args).status() {
        Ok(status) if !status.success() => {
            eprintln!("{cmd} {} exited with {status}", args.join(" "));
        }
        Err(e) => eprintln!("failed to run {cmd}: {e}"),
        Ok(_) => {}
    }
}

/// Opens `$VISUAL`/`$EDITOR`/`vi` on the config file after writing a default
/// one if none exists yet.
pub fn configure() -> io::Result<()> {
    std::fs::create_dir_all(CONF_DIR)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(CONF_DIR, std::fs::Permissions::from_mode(0o700))?;
    }

    write_config_if_absent()?;

    let editor = std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .unwrap_or_else(|_| DEFAULT_EDITOR.to_string());
    let status = Command::new(editor).arg(CONF_FILE).status()?;
    if !status.success() {
        eprintln!("editor exited with {status}");
    }
    Ok(())
}

/// Installs the systemd unit and starts the service, matching
/// `ServiceManager.install`'s ordering: tmpfile, config, unit, then
/// `daemon-reload`/`start`/`enable`/`status`.
pub fn install() -> io::Result<()> {
    println!("Installing systemd service for Alpamon Agent...");

    std::fs::write(TMPFILE_UNIT, "d /var/lib/alpamon 0755 root root -\n")?;
    run("systemd-tmpfiles", &["--create"]);

    write_config_if_absent()?;
    std::fs::write(SERVICE_UNIT, service_unit())?;

    run("systemctl", &["daemon-reload"]);
    run("systemctl", &["start", "alpamon.service"]);
    run("systemctl", &["enable", "alpamon.service"]);
    run("systemctl", &["--no-pager", "status", "alpamon.service"]);

    println!("Alpamon Agent has been installed as a systemd service and will be launched automatically on system boot.");
    Ok(())
}

/// Stops and removes the systemd unit and persisted state, matching
/// `ServiceManager.uninstall`.
pub fn uninstall() -> io::Result<()> {
    println!("Uninstalling systemd service for Alpamon Agent...");
    run("systemctl", &["stop", "alpamon.service"]);
    run("systemctl", &["disable", "alpamon.service"]);
    let _ = std::fs::remove_file(TMPFILE_UNIT);
    let _ = std::fs::remove_file(SERVICE_UNIT);
    run("systemctl", &["daemon-reload"]);

    println!("Removing configuration files...");
    let _ = std::fs::remove_dir_all("/var/lib/alpamon");
    let _ = std::fs::remove_file(CONF_FILE);
    let _ = std::fs::remove_dir(CONF_DIR);

    println!("Alpamon Agent has been removed successfully!");
    println!("Run \"rm -rf /var/log/alpamon\" to remove logs as well.");
    Ok(())
}
