//! Host facts from the running system
//!
//! Display metrics come from the controlling terminal, device identity and
//! process metadata from sysinfo, and the loaded library list from the
//! process memory map.

use std::io::IsTerminal;
use std::time::Instant;

use chrono::Utc;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::debug;

use super::{FieldResult, FieldUnavailable, HostFacts, HostFactsProvider};
use crate::config::SamplerSettings;
use crate::types::{FactMap, UNAVAILABLE};

const MB: u64 = 1024 * 1024;

/// Provider backed by the operating system
pub struct SystemHostFacts {
    sys: System,
    pid: Option<Pid>,
    started: Instant,
    include_environment: bool,
    include_libraries: bool,
    max_libraries: usize,
}

impl SystemHostFacts {
    pub fn new(settings: &SamplerSettings) -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                debug!(error = e, "Current pid not available from sysinfo");
                None
            }
        };

        Self {
            sys: System::new_all(),
            pid,
            started: Instant::now(),
            include_environment: settings.include_environment,
            include_libraries: settings.include_libraries,
            max_libraries: settings.max_libraries,
        }
    }

    fn display_metrics(&self) -> FieldResult<FactMap> {
        let mut facts = FactMap::new();

        match crossterm::terminal::window_size() {
            Ok(size) => {
                insert(&mut facts, "columns", size.columns);
                insert(&mut facts, "rows", size.rows);
                // Pixel sizes are zero when the terminal does not report them
                insert_opt(&mut facts, "width_px", nonzero(size.width));
                insert_opt(&mut facts, "height_px", nonzero(size.height));
                if size.width > 0 && size.columns > 0 && size.rows > 0 {
                    insert(
                        &mut facts,
                        "cell_px",
                        format!("{}x{}", size.width / size.columns, size.height / size.rows),
                    );
                }
            }
            Err(window_err) => match crossterm::terminal::size() {
                Ok((columns, rows)) => {
                    insert(&mut facts, "columns", columns);
                    insert(&mut facts, "rows", rows);
                }
                Err(_) => {
                    return Err(FieldUnavailable::new("display_metrics", window_err.to_string()));
                }
            },
        }

        insert(&mut facts, "stdout_is_terminal", std::io::stdout().is_terminal());
        insert(&mut facts, "term", env_or_unavailable("TERM"));
        insert(&mut facts, "colorterm", env_or_unavailable("COLORTERM"));

        Ok(facts)
    }

    fn device_info(&mut self) -> FieldResult<FactMap> {
        self.sys.refresh_memory();

        let mut facts = FactMap::new();
        let name = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| UNAVAILABLE.to_string());
        insert(&mut facts, "name", name);
        let model = self.sys.cpus().first().map(|cpu| cpu.brand().trim().to_string());
        insert_opt(&mut facts, "model", model);
        insert_opt(&mut facts, "system_name", System::name());
        insert_opt(&mut facts, "system_version", System::os_version());
        insert_opt(&mut facts, "kernel_version", System::kernel_version());
        insert(&mut facts, "arch", std::env::consts::ARCH);
        insert(&mut facts, "family", std::env::consts::FAMILY);
        insert(&mut facts, "cpu_count", num_cpus::get());
        insert(&mut facts, "physical_cores", num_cpus::get_physical());
        insert(&mut facts, "total_memory_mb", self.sys.total_memory() / MB);
        insert(&mut facts, "used_memory_mb", self.sys.used_memory() / MB);

        Ok(facts)
    }

    fn process_info(&mut self) -> FieldResult<FactMap> {
        let mut facts = FactMap::new();

        insert(&mut facts, "pid", std::process::id());
        insert(&mut facts, "arguments", format!("{:?}", args_lossy()));
        insert(&mut facts, "globally_unique_string", uuid::Uuid::new_v4());
        insert_opt(&mut facts, "host_name", System::host_name());
        insert_opt(&mut facts, "operating_system_version_string", System::long_os_version());
        insert(&mut facts, "system_uptime_secs", System::uptime());
        insert(&mut facts, "process_uptime_secs", self.started.elapsed().as_secs());
        insert_opt(
            &mut facts,
            "executable",
            std::env::current_exe().ok().map(|p| p.display().to_string()),
        );
        insert_opt(
            &mut facts,
            "working_directory",
            std::env::current_dir().ok().map(|p| p.display().to_string()),
        );

        if let Some(pid) = self.pid {
            self.sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        }
        let process = self.pid.and_then(|pid| self.sys.process(pid));
        insert_opt(
            &mut facts,
            "process_name",
            process.map(|p| p.name().to_string_lossy().into_owned()),
        );
        insert_opt(&mut facts, "memory_mb", process.map(|p| p.memory() / MB));

        if self.include_environment {
            let env: Vec<(String, String)> = std::env::vars_os()
                .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned()))
                .collect();
            insert(&mut facts, "environment_count", env.len());
            for (key, value) in env {
                facts.insert(format!("env.{}", key), value);
            }
        }

        Ok(facts)
    }

    fn loaded_libraries(&self) -> FieldResult<Vec<String>> {
        if !self.include_libraries {
            return Err(FieldUnavailable::new("loaded_libraries", "disabled by configuration"));
        }

        let mut libraries = read_loaded_libraries()?;
        if self.max_libraries > 0 {
            libraries.truncate(self.max_libraries);
        }
        Ok(libraries)
    }
}

impl HostFactsProvider for SystemHostFacts {
    fn name(&self) -> &'static str {
        "system"
    }

    fn collect(&mut self) -> HostFacts {
        HostFacts {
            now: Utc::now(),
            display: self.display_metrics(),
            device: self.device_info(),
            process: self.process_info(),
            libraries: self.loaded_libraries(),
        }
    }
}

#[cfg(target_os = "linux")]
fn read_loaded_libraries() -> FieldResult<Vec<String>> {
    std::fs::read_to_string("/proc/self/maps")
        .map(|maps| parse_proc_maps(&maps))
        .map_err(|e| FieldUnavailable::new("loaded_libraries", format!("/proc/self/maps: {}", e)))
}

#[cfg(not(target_os = "linux"))]
fn read_loaded_libraries() -> FieldResult<Vec<String>> {
    Err(FieldUnavailable::new(
        "loaded_libraries",
        format!("not supported on {}", std::env::consts::OS),
    ))
}

/// Extract shared object paths from a `/proc/<pid>/maps` listing, in first-mapped order
pub fn parse_proc_maps(maps: &str) -> Vec<String> {
    let mut libraries: Vec<String> = Vec::new();

    for line in maps.lines() {
        let Some(path) = maps_pathname(line) else {
            continue;
        };
        if !path.starts_with('/') || !is_shared_object(path) {
            continue;
        }
        if !libraries.iter().any(|seen| seen == path) {
            libraries.push(path.to_string());
        }
    }

    libraries
}

/// The pathname column of one maps line; it may contain spaces
fn maps_pathname(line: &str) -> Option<&str> {
    // address perms offset dev inode pathname
    let mut rest = line;
    for _ in 0..5 {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace)?;
        rest = &rest[end..];
    }

    let path = rest.trim();
    let path = path.strip_suffix(" (deleted)").unwrap_or(path);
    (!path.is_empty()).then_some(path)
}

fn is_shared_object(path: &str) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    file_name.ends_with(".so") || file_name.contains(".so.")
}

fn insert(facts: &mut FactMap, key: &str, value: impl ToString) {
    facts.insert(key.to_string(), value.to_string());
}

/// Insert an optional fact; `None` becomes the sentinel
fn insert_opt(facts: &mut FactMap, key: &str, value: Option<impl ToString>) {
    let value = value
        .map(|v| v.to_string())
        .unwrap_or_else(|| UNAVAILABLE.to_string());
    facts.insert(key.to_string(), value);
}

fn nonzero(value: u16) -> Option<u16> {
    (value > 0).then_some(value)
}

fn env_or_unavailable(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| UNAVAILABLE.to_string())
}

fn args_lossy() -> Vec<String> {
    std::env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPS: &str = "\
55d0c0a00000-55d0c0a20000 r--p 00000000 08:01 1234 /usr/bin/debuginfo
7f1a2b000000-7f1a2b022000 r--p 00000000 08:01 5678 /usr/lib/x86_64-linux-gnu/libc.so.6
7f1a2b022000-7f1a2b19a000 r-xp 00022000 08:01 5678 /usr/lib/x86_64-linux-gnu/libc.so.6
7f1a2c000000-7f1a2c010000 r--p 00000000 08:01 9012 /usr/lib/x86_64-linux-gnu/libgcc_s.so.1
7f1a2d000000-7f1a2d021000 rw-p 00000000 00:00 0 [heap]
7f1a2e000000-7f1a2e001000 r--p 00000000 08:01 3456 /opt/plugins/libprobe.so
7f1a2e100000-7f1a2e101000 r--p 00000000 08:01 3457                       /opt/My Apps/libspace.so
7f1a2e200000-7f1a2e201000 r--p 00000000 08:01 3458 /tmp/libreplaced.so (deleted)
7ffd1c000000-7ffd1c021000 rw-p 00000000 00:00 0 [stack]
7ffd1d000000-7ffd1d002000 r-xp 00000000 00:00 0
";

    #[test]
    fn test_parse_proc_maps_keeps_shared_objects_in_order() {
        let libraries = parse_proc_maps(MAPS);
        assert_eq!(
            libraries,
            vec![
                "/usr/lib/x86_64-linux-gnu/libc.so.6",
                "/usr/lib/x86_64-linux-gnu/libgcc_s.so.1",
                "/opt/plugins/libprobe.so",
                "/opt/My Apps/libspace.so",
                "/tmp/libreplaced.so",
            ]
        );
    }

    #[test]
    fn test_parse_proc_maps_keeps_spaces_in_paths() {
        let libraries =
            parse_proc_maps("7f00-7f01 r--p 00000000 08:01 1 /opt/My Apps/libspace.so\n");
        assert_eq!(libraries, vec!["/opt/My Apps/libspace.so"]);
    }

    #[test]
    fn test_parse_proc_maps_empty() {
        assert!(parse_proc_maps("").is_empty());
    }

    #[test]
    fn test_insert_opt_sentinel() {
        let mut facts = FactMap::new();
        insert_opt(&mut facts, "missing", None::<u32>);
        insert_opt(&mut facts, "present", Some(3u32));
        assert_eq!(facts["missing"], UNAVAILABLE);
        assert_eq!(facts["present"], "3");
    }

    #[test]
    fn test_system_collect_never_fails_device_or_process() {
        let mut provider = SystemHostFacts::new(&SamplerSettings::default());
        let facts = provider.collect();

        let device = facts.device.unwrap();
        assert!(device.contains_key("name"));
        assert_eq!(device["arch"], std::env::consts::ARCH);

        let process = facts.process.unwrap();
        assert_eq!(process["pid"], std::process::id().to_string());
        assert!(process.contains_key("env.PATH") || process.contains_key("environment_count"));
    }

    #[test]
    fn test_libraries_disabled_by_configuration() {
        let settings = SamplerSettings {
            include_libraries: false,
            ..Default::default()
        };
        let mut provider = SystemHostFacts::new(&settings);
        let err = provider.collect().libraries.unwrap_err();
        assert_eq!(err.reason, "disabled by configuration");
    }
}
