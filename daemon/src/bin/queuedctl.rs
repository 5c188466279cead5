//! Thin command line client for the daemon's HTTP surface.

use std::fs;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde_json::{json, Value};

const TOKEN_HEADER: &str = "x-queued-token";

#[derive(Parser)]
#[command(name = "queuedctl", about = "Control the queued daemon", version)]
struct Cli {
    /// Daemon base URL.
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "QUEUED_SERVER")]
    server: String,
    /// Bearer token; defaults to the cached value from `auth`.
    #[arg(long, env = "QUEUED_TOKEN")]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Authenticate and cache the received token.
    Auth {
        user: String,
        /// Password; read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Read a single option.
    OptionGet { key: String },
    /// Write a single option.
    OptionSet { key: String, value: String },
    /// Grant a permission to a user id.
    PermissionAdd { id: i64, permission: String },
    /// Revoke a permission from a user id.
    PermissionRemove { id: i64, permission: String },
    /// Load a plugin.
    PluginAdd { name: String },
    /// List loaded plugins.
    PluginList,
    /// Show a plugin's options.
    PluginOptions { name: String },
    /// Unload a plugin.
    PluginRemove { name: String },
    /// Show a plugin's stored configuration keys.
    PluginSpecification { name: String },
    /// Per-user usage report.
    Report {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// Daemon build metadata.
    Status,
    /// Submit a task.
    TaskAdd {
        command: String,
        /// Program arguments.
        #[arg(trailing_var_arg = true)]
        arguments: Vec<String>,
        #[arg(long)]
        working_directory: Option<String>,
        /// Owner user id; defaults to the caller.
        #[arg(long)]
        user: Option<i64>,
        #[arg(long, default_value_t = 0)]
        nice: i64,
        #[arg(long)]
        limit_cpu: Option<String>,
        #[arg(long)]
        limit_gpu: Option<String>,
        #[arg(long)]
        limit_memory: Option<String>,
        #[arg(long)]
        limit_gpumemory: Option<String>,
        #[arg(long)]
        limit_storage: Option<String>,
    },
    /// Show a task.
    TaskGet {
        id: i64,
        #[arg(long)]
        property: Option<String>,
    },
    /// List tasks.
    TaskList {
        #[arg(long)]
        user_id: Option<i64>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        stop: Option<String>,
    },
    /// Edit a task.
    TaskSet {
        id: i64,
        #[arg(long)]
        command: Option<String>,
        #[arg(long)]
        working_directory: Option<String>,
        #[arg(long)]
        nice: Option<i64>,
        #[arg(long)]
        limit_cpu: Option<String>,
        #[arg(long)]
        limit_memory: Option<String>,
    },
    /// Force-start a task.
    TaskStart { id: i64 },
    /// Force-stop a task.
    TaskStop { id: i64 },
    /// Create a user.
    UserAdd {
        name: String,
        #[arg(long)]
        password: Option<String>,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value_t = 0)]
        permissions: i64,
        #[arg(long, default_value_t = 0)]
        priority: i64,
    },
    /// Show a user.
    UserGet {
        name: String,
        #[arg(long)]
        property: Option<String>,
    },
    /// List users.
    UserList {
        #[arg(long)]
        last_logged: Option<String>,
        #[arg(long)]
        permission: Option<String>,
    },
    /// Edit a user.
    UserSet {
        name: String,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        priority: Option<i64>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<String> {
    let Cli {
        server,
        token,
        command,
    } = cli;
    let client = Client::new();
    let token = token.or_else(load_cached_token);

    let call = |method: Method,
                path: &str,
                query: Vec<(&str, String)>,
                body: Option<Value>|
     -> anyhow::Result<Value> {
        let url = format!("{}/api/v1{}", server.trim_end_matches('/'), path);
        let mut request = client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .header(TOKEN_HEADER, token.clone().unwrap_or_default());
        if !query.is_empty() {
            request = request.query(&query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().context("could not reach daemon")?;
        let status = response.status();
        let payload: Value = response.json().unwrap_or_else(|_| json!({}));
        if !status.is_success() {
            let message = payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_else(|| status.as_str());
            return Err(anyhow!("{message}"));
        }
        Ok(payload)
    };

    let output = match command {
        Command::Auth { user, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt_password()?,
            };
            let response = call(
                Method::POST,
                "/auth",
                Vec::new(),
                Some(json!({"user": user, "password": password})),
            )?;
            let token = response
                .get("token")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("no token in response"))?;
            cache_token(token)?;
            json!({"token": token})
        }
        Command::OptionGet { key } => {
            call(Method::GET, &format!("/option/{key}"), Vec::new(), None)?
        }
        Command::OptionSet { key, value } => call(
            Method::POST,
            &format!("/option/{key}"),
            Vec::new(),
            Some(json!({"value": value})),
        )?,
        Command::PermissionAdd { id, permission } => call(
            Method::POST,
            &format!("/permissions/{id}"),
            Vec::new(),
            Some(json!({"permission": permission})),
        )?,
        Command::PermissionRemove { id, permission } => call(
            Method::DELETE,
            &format!("/permissions/{id}"),
            Vec::new(),
            Some(json!({"permission": permission})),
        )?,
        Command::PluginAdd { name } => {
            call(Method::POST, &format!("/plugin/{name}"), Vec::new(), None)?
        }
        Command::PluginList => call(Method::GET, "/plugins", Vec::new(), None)?,
        Command::PluginOptions { name } | Command::PluginSpecification { name } => {
            call(Method::GET, &format!("/plugin/{name}"), Vec::new(), None)?
        }
        Command::PluginRemove { name } => {
            call(Method::DELETE, &format!("/plugin/{name}"), Vec::new(), None)?
        }
        Command::Report { from, to } => {
            let mut query = Vec::new();
            if let Some(from) = from {
                query.push(("from", from));
            }
            if let Some(to) = to {
                query.push(("to", to));
            }
            call(Method::GET, "/reports", query, None)?
        }
        Command::Status => call(Method::GET, "/status", Vec::new(), None)?,
        Command::TaskAdd {
            command,
            arguments,
            working_directory,
            user,
            nice,
            limit_cpu,
            limit_gpu,
            limit_memory,
            limit_gpumemory,
            limit_storage,
        } => {
            let mut body = json!({
                "command": command,
                "arguments": arguments,
                "nice": nice,
            });
            set_opt(&mut body, "workingDirectory", working_directory.map(Value::from));
            set_opt(&mut body, "user", user.map(Value::from));
            set_opt(&mut body, "limitCpu", limit_cpu.map(Value::from));
            set_opt(&mut body, "limitGpu", limit_gpu.map(Value::from));
            set_opt(&mut body, "limitMemory", limit_memory.map(Value::from));
            set_opt(&mut body, "limitGpumemory", limit_gpumemory.map(Value::from));
            set_opt(&mut body, "limitStorage", limit_storage.map(Value::from));
            call(Method::POST, "/task", Vec::new(), Some(body))?
        }
        Command::TaskGet { id, property } => {
            let mut query = Vec::new();
            if let Some(property) = property {
                query.push(("property", property));
            }
            call(Method::GET, &format!("/task/{id}"), query, None)?
        }
        Command::TaskList {
            user_id,
            start,
            stop,
        } => {
            let mut query = Vec::new();
            if let Some(user_id) = user_id {
                query.push(("userId", user_id.to_string()));
            }
            if let Some(start) = start {
                query.push(("start", start));
            }
            if let Some(stop) = stop {
                query.push(("stop", stop));
            }
            call(Method::GET, "/tasks", query, None)?
        }
        Command::TaskSet {
            id,
            command,
            working_directory,
            nice,
            limit_cpu,
            limit_memory,
        } => {
            let mut body = json!({});
            set_opt(&mut body, "command", command.map(Value::from));
            set_opt(&mut body, "workingDirectory", working_directory.map(Value::from));
            set_opt(&mut body, "nice", nice.map(Value::from));
            set_opt(&mut body, "limitCpu", limit_cpu.map(Value::from));
            set_opt(&mut body, "limitMemory", limit_memory.map(Value::from));
            call(Method::POST, &format!("/task/{id}"), Vec::new(), Some(body))?
        }
        Command::TaskStart { id } => {
            let current = call(Method::GET, &format!("/task/{id}"), Vec::new(), None)?;
            let running = current["properties"]["startTime"].is_string()
                && current["properties"]["endTime"].is_null();
            if running {
                return Err(anyhow!("Task is already running"));
            }
            call(Method::PUT, &format!("/task/{id}"), Vec::new(), None)?
        }
        Command::TaskStop { id } => {
            let current = call(Method::GET, &format!("/task/{id}"), Vec::new(), None)?;
            let running = current["properties"]["startTime"].is_string()
                && current["properties"]["endTime"].is_null();
            if !running {
                return Err(anyhow!("Task is not running"));
            }
            call(Method::PUT, &format!("/task/{id}"), Vec::new(), None)?
        }
        Command::UserAdd {
            name,
            password,
            email,
            permissions,
            priority,
        } => {
            let password = match password {
                Some(password) => password,
                None => prompt_password()?,
            };
            call(
                Method::POST,
                &format!("/user/{name}"),
                Vec::new(),
                Some(json!({
                    "password": password,
                    "email": email,
                    "permissions": permissions,
                    "priority": priority,
                })),
            )?
        }
        Command::UserGet { name, property } => {
            let mut query = Vec::new();
            if let Some(property) = property {
                query.push(("property", property));
            }
            call(Method::GET, &format!("/user/{name}"), query, None)?
        }
        Command::UserList {
            last_logged,
            permission,
        } => {
            let mut query = Vec::new();
            if let Some(last_logged) = last_logged {
                query.push(("lastLogged", last_logged));
            }
            if let Some(permission) = permission {
                query.push(("permission", permission));
            }
            call(Method::GET, "/users", query, None)?
        }
        Command::UserSet {
            name,
            password,
            email,
            priority,
        } => {
            let mut body = json!({});
            set_opt(&mut body, "password", password.map(Value::from));
            set_opt(&mut body, "email", email.map(Value::from));
            set_opt(&mut body, "priority", priority.map(Value::from));
            call(Method::POST, &format!("/user/{name}"), Vec::new(), Some(body))?
        }
    };

    Ok(serde_json::to_string_pretty(&output)?)
}

fn set_opt(body: &mut Value, key: &str, value: Option<Value>) {
    if let (Some(map), Some(value)) = (body.as_object_mut(), value) {
        map.insert(key.to_string(), value);
    }
}

fn prompt_password() -> anyhow::Result<String> {
    eprint!("password: ");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("could not read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn token_cache_path() -> PathBuf {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        return PathBuf::from(base).join("queued/token");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".cache/queued/token");
    }
    std::env::temp_dir().join("queued-token")
}

fn load_cached_token() -> Option<String> {
    fs::read_to_string(token_cache_path())
        .ok()
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn cache_token(token: &str) -> anyhow::Result<()> {
    let path = token_cache_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, token).with_context(|| format!("could not cache token at {}", path.display()))
}
