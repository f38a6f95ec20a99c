//! The top-level agent run: read, parse, resolve, compile, expand,
//! render, spawn, relay.
//!
//! Linear flow, one invocation per process:
//!
//! 1. resolve the target (local search path or remote fetch + trust check)
//! 2. split front matter from body
//! 3. pick the driver (CLI `--_command` beats the filename convention)
//! 4. merge the config cascade, front matter, and CLI flag overrides
//! 5. apply the interactive transform when marked
//! 6. build the variable binding set
//! 7. expand import/command directives
//! 8. prompt for (or fail on) unbound `_`-variables, then render
//! 9. compile argv and spawn the driver, relaying its exit code

pub mod driver;
pub mod locate;
pub mod vars;

use anyhow::Result;
use std::collections::BTreeSet;
use std::io::{IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::adapters::{builtin_defaults_layer, ToolAdapter};
use crate::cli::hijack::{self, ParsedArgs};
use crate::compiler;
use crate::config::{self, ConfigValue};
use crate::constants::{MAX_INPUT_SIZE, MDFLOW_DIR};
use crate::core::{CancelHandle, CancelToken, MdflowError};
use crate::markdown::{self, Document};
use crate::resolver::{Dashboard, ExecContext, Resolver};
use crate::template::{self, TemplateEngine};
use crate::tokens;
use crate::utils::fs::read_text_capped;
use crate::utils::platform::{canonicalize, get_home_dir};
use crate::utils::shell;

use driver::DriverInvocation;
use locate::AgentSource;

/// Run an agent file end to end; returns the exit code to relay.
pub async fn run(target: &str, raw_args: &[String]) -> Result<i32> {
    let cwd = std::env::current_dir()?;
    let parsed = hijack::parse_remaining(raw_args);
    debug!(
        "Env layers for this run: {}",
        crate::utils::platform::env_file_names().join(", ")
    );

    let (cancel_handle, cancel) = CancelToken::new();
    let signal_name = install_signal_handlers(cancel_handle);

    let source = locate::resolve_target(target, &cwd)?;
    let agent_path = match source {
        AgentSource::Local(path) => path,
        AgentSource::Remote(url) => fetch_remote_agent(&url, &parsed).await?,
    };

    let text = read_text_capped(&agent_path).await?;
    let doc = Document::parse(&text, &agent_path)?;

    let filename_driver = locate::driver_from_filename(&agent_path);
    let filename_interactive = filename_driver.as_ref().is_some_and(|(_, i)| *i);
    let driver_name = parsed
        .hijacked
        .command
        .clone()
        .or_else(|| filename_driver.map(|(d, _)| d))
        .ok_or_else(|| MdflowError::ConfigurationError {
            message: format!(
                "cannot determine the driver for '{}': name it <agent>.<driver>.md or pass --_command",
                agent_path.display()
            ),
        })?;

    // Cascade, then front matter, then CLI flag overrides.
    let cascade = config::load_cascade(&builtin_defaults_layer(), &cwd);
    let mut effective = config::defaults_for(&cascade, &driver_name);
    for (key, value) in doc.config.iter() {
        effective.insert(key.to_string(), value.clone());
    }
    for (key, value) in parsed.flag_overrides.iter() {
        effective.insert(key.to_string(), value.clone());
    }

    let adapter = ToolAdapter::for_name(&driver_name);
    let config_interactive = crate::adapters::INTERACTIVE_KEYS
        .iter()
        .any(|key| effective.get(key).is_some_and(ConfigValue::is_interactive_truthy));
    if filename_interactive || config_interactive || parsed.hijacked.interactive {
        effective = adapter.apply_interactive(effective);
    }

    let env = compiler::env_additions(&effective);
    let stdin_text = read_piped_stdin()?;
    let mut bindings =
        vars::build_bindings(&effective, &parsed.template_vars, &parsed.positionals, stdin_text.as_deref());

    // Directive expansion.
    let agent_dir = agent_path
        .parent()
        .map_or_else(|| cwd.clone(), Path::to_path_buf);
    let invocation_cwd = parsed.hijacked.cwd.clone().or_else(|| {
        effective.get("_cwd").and_then(ConfigValue::as_str).map(PathBuf::from)
    });
    let context_limit = tokens::resolve_context_limit(
        effective.get("context_window").and_then(ConfigValue::as_usize),
        effective.get("model").and_then(ConfigValue::as_str),
    );

    let engine = Arc::new(TemplateEngine::new()?);
    let (expanded, resolved_imports) = if markdown::has_directives(&doc.body) {
        let exec = ExecContext {
            cwd: agent_dir.clone(),
            env: env.clone(),
            vars: bindings.clone(),
            tool_name: tool_name(),
            dry_run: parsed.hijacked.dry_run,
            engine: Arc::clone(&engine),
            cancel: cancel.clone(),
            dashboard: Dashboard::new(),
        };
        let resolver = Resolver::new(exec, invocation_cwd, context_limit);
        let stack = vec![canonicalize(&agent_path)?];
        let expanded = resolver.expand(doc.body.clone(), agent_dir.clone(), stack).await?;
        (expanded, resolver.resolved_imports())
    } else {
        (doc.body.clone(), Vec::new())
    };

    // Unbound prompt-fillable variables: ask on a terminal, fail otherwise.
    let free = template::free_variables(&expanded);
    vars::bind_referenced_config(&mut bindings, &effective, &free);
    let missing: Vec<&String> = free
        .iter()
        .filter(|name| name.starts_with('_') && !bindings.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        if std::io::stdin().is_terminal() {
            for name in &missing {
                let value = prompt_for(name)?;
                bindings.insert((*name).clone(), value);
            }
        } else {
            return Err(MdflowError::MissingTemplateVariables {
                names: missing.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", "),
            }
            .into());
        }
    }

    let rendered = engine.render(&expanded, &bindings)?;

    // Compile argv: the body leads the positionals; CLI positionals whose
    // variables the template consumed do not trail.
    let consumed: BTreeSet<String> = free.clone();
    let args_consumed = free.contains("_args");
    let mut argv_positionals = vec![rendered.clone()];
    for (i, positional) in parsed.positionals.iter().enumerate() {
        if !args_consumed && !free.contains(&format!("_{}", i + 1)) {
            argv_positionals.push(positional.clone());
        }
    }
    let argv = compiler::compile_argv(&effective, &consumed, &argv_positionals);

    if parsed.hijacked.dry_run {
        print_dry_run(&driver_name, &argv, &rendered, &resolved_imports);
        return Err(MdflowError::EarlyExitRequest.into());
    }

    let invocation = DriverInvocation { program: driver_name, argv, env, cwd };
    let child_cell = driver::new_child_cell();
    driver::spawn_driver(&invocation, &child_cell, &cancel, &signal_name).await
}

/// Our own binary name, for recursive markdown-command rewrites.
fn tool_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "mdflow".to_string())
}

/// Install SIGINT/SIGTERM handlers that trip the cancellation token and
/// record which signal fired.
fn install_signal_handlers(handle: CancelHandle) -> Arc<Mutex<Option<&'static str>>> {
    let signal_name: Arc<Mutex<Option<&'static str>>> = Arc::new(Mutex::new(None));
    let recorded = Arc::clone(&signal_name);

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        let Ok(mut interrupt) = signal(SignalKind::interrupt()) else { return };
        let Ok(mut terminate) = signal(SignalKind::terminate()) else { return };
        let name = tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        };
        *recorded.lock().expect("signal cell lock never poisoned") = Some(name);
        handle.cancel();
    });

    #[cfg(not(unix))]
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            *recorded.lock().expect("signal cell lock never poisoned") = Some("SIGINT");
            handle.cancel();
        }
    });

    signal_name
}

/// Read piped stdin fully, up to the input cap. `None` on a terminal.
fn read_piped_stdin() -> Result<Option<String>> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut buf = String::new();
    let mut limited = (&mut stdin).take(MAX_INPUT_SIZE + 1);
    limited.read_to_string(&mut buf).map_err(|e| MdflowError::ImportError {
        message: format!("failed to read stdin: {e}"),
    })?;
    if buf.len() as u64 > MAX_INPUT_SIZE {
        return Err(MdflowError::FileSizeLimit {
            path: "<stdin>".to_string(),
            size: buf.len() as u64,
            limit: MAX_INPUT_SIZE,
        }
        .into());
    }
    Ok(Some(buf))
}

/// Ask the user for one template variable on the terminal.
fn prompt_for(name: &str) -> Result<String> {
    eprint!("{name}: ");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    let read = std::io::stdin()
        .read_line(&mut line)
        .map_err(|_| MdflowError::UserCancelled)?;
    if read == 0 {
        return Err(MdflowError::UserCancelled.into());
    }
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Fetch a remote agent file, enforcing trust-on-first-use.
async fn fetch_remote_agent(url: &str, parsed: &ParsedArgs) -> Result<PathBuf> {
    let domain = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(ToString::to_string))
        .ok_or_else(|| MdflowError::ConfigurationError {
            message: format!("invalid agent URL: {url}"),
        })?;

    let known_hosts = known_hosts_path()?;
    if !parsed.hijacked.trust && !domain_trusted(&known_hosts, &domain) {
        if std::io::stdin().is_terminal() {
            eprint!("Trust agent files from '{domain}'? [y/N] ");
            std::io::stderr().flush().ok();
            let mut answer = String::new();
            std::io::stdin().read_line(&mut answer).ok();
            if !answer.trim().eq_ignore_ascii_case("y") {
                return Err(MdflowError::UserCancelled.into());
            }
            remember_domain(&known_hosts, &domain)?;
        } else {
            return Err(MdflowError::SecurityError { domain }.into());
        }
    }

    let cache_dir = get_home_dir()?.join(MDFLOW_DIR).join("cache");
    let file_name = url
        .split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or("remote.md");
    let cached = cache_dir.join(file_name);

    if cached.is_file() && !parsed.hijacked.no_cache {
        debug!("Using cached remote agent {}", cached.display());
        return Ok(cached);
    }

    let client = reqwest::Client::new();
    let text = crate::resolver::url::fetch_url(&client, url).await?;
    std::fs::create_dir_all(&cache_dir).map_err(|e| MdflowError::ImportError {
        message: format!("cannot create cache dir: {e}"),
    })?;
    std::fs::write(&cached, text).map_err(|e| MdflowError::ImportError {
        message: format!("cannot cache remote agent: {e}"),
    })?;
    Ok(cached)
}

/// Location of the TOFU store.
fn known_hosts_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join(MDFLOW_DIR).join("known_hosts"))
}

/// Check a domain against the TOFU store.
fn domain_trusted(store: &Path, domain: &str) -> bool {
    std::fs::read_to_string(store)
        .map(|text| text.lines().any(|line| line.trim() == domain))
        .unwrap_or(false)
}

/// Append a domain to the TOFU store.
fn remember_domain(store: &Path, domain: &str) -> Result<()> {
    if let Some(dir) = store.parent() {
        std::fs::create_dir_all(dir).ok();
    }
    let mut existing = std::fs::read_to_string(store).unwrap_or_default();
    if !existing.ends_with('\n') && !existing.is_empty() {
        existing.push('\n');
    }
    existing.push_str(domain);
    existing.push('\n');
    std::fs::write(store, existing).map_err(|e| {
        MdflowError::ImportError { message: format!("cannot update known_hosts: {e}") }.into()
    })
}

/// Print the dry-run plan: command line, imports, token estimate, prompt.
fn print_dry_run(driver: &str, argv: &[String], prompt: &str, imports: &[String]) {
    use colored::Colorize;
    let mut command_line = vec![driver.to_string()];
    command_line.extend_from_slice(argv);
    println!("{}", "Dry run".bold());
    println!("  {} {}", "command:".cyan(), shell::format_argv(&command_line));
    if !imports.is_empty() {
        println!("  {} {}", "imports:".cyan(), imports.join(", "));
    }
    println!(
        "  {} ~{}",
        "tokens:".cyan(),
        tokens::format_token_count(tokens::count_tokens(prompt))
    );
    println!("  {}", "prompt:".cyan());
    println!("{prompt}");
}
