use profscope_model::Mapping;
use std::path::PathBuf;

/// Returns the file backed mappings of the current process, main binary first.
#[cfg(target_os = "linux")]
pub fn current_mappings() -> Vec<Mapping> {
    let maps = match std::fs::read_to_string("/proc/self/maps") {
        Ok(maps) => maps,
        Err(error) => {
            tracing::debug!("cannot read process mappings: {error}");
            return fallback_mappings();
        }
    };
    let mut mappings = parse_proc_maps(&maps);
    if let Ok(exe) = std::env::current_exe() {
        mappings.sort_by_key(|m| m.file != exe);
    }
    mappings
}

#[cfg(not(target_os = "linux"))]
pub fn current_mappings() -> Vec<Mapping> {
    fallback_mappings()
}

fn fallback_mappings() -> Vec<Mapping> {
    std::env::current_exe()
        .map(|file| {
            vec![Mapping {
                start: 0,
                limit: 0,
                offset: 0,
                file,
            }]
        })
        .unwrap_or_default()
}

/// Parses the executable, file backed entries of a `/proc/<pid>/maps` listing.
fn parse_proc_maps(maps: &str) -> Vec<Mapping> {
    maps.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let range = fields.next()?;
            let perms = fields.next()?;
            let offset = fields.next()?;
            let _device = fields.next()?;
            let _inode = fields.next()?;
            let path = fields.collect::<Vec<_>>().join(" ");
            if !perms.contains('x') || !path.starts_with('/') {
                return None;
            }
            let (start, limit) = range.split_once('-')?;
            Some(Mapping {
                start: u64::from_str_radix(start, 16).ok()?,
                limit: u64::from_str_radix(limit, 16).ok()?,
                offset: u64::from_str_radix(offset, 16).ok()?,
                file: PathBuf::from(path),
            })
        })
        .collect()
}
