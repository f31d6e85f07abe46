//! Machine description from `/proc` and `/sys`.
//!
//! Parsing is kept apart from file access so it can be tested on canned text.

use std::collections::HashSet;
use std::fs;
use std::io::Result;
use std::path::{Path, PathBuf};

use crate::ffi::PAGE_SIZE;
use crate::topology::*;

const CPU_DIR: &str = "/sys/devices/system/cpu";

/// Identity fields of `/proc/cpuinfo`, from the first processor.
#[derive(Clone, Debug, Default, PartialEq)]
pub(super) struct CpuIdentity {
    pub vendor_name: String,
    pub model_name: String,
    pub family: i32,
    pub model: i32,
    pub stepping: i32,
    pub revision: f32,
    pub mhz: f32,
}

pub(super) fn parse_cpuinfo(text: &str) -> CpuIdentity {
    let mut id = CpuIdentity::default();
    // Only the first processor block.
    for line in text.lines().take_while(|line| !line.trim().is_empty()) {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        let int = || parse_int(value).unwrap_or(0) as i32;
        match key.trim() {
            "vendor_id" | "CPU implementer" => id.vendor_name = value.to_string(),
            "model name" | "Processor" => id.model_name = value.to_string(),
            "cpu family" | "CPU architecture" => id.family = int(),
            "model" | "CPU part" => id.model = int(),
            "stepping" | "CPU variant" => id.stepping = int(),
            "CPU revision" => id.revision = int() as f32,
            "cpu MHz" => id.mhz = value.parse().unwrap_or(0.0),
            _ => (),
        }
    }
    if id.revision == 0.0 {
        id.revision = id.stepping as f32;
    }
    id
}

/// Decimal or `0x` prefixed hexadecimal.
fn parse_int(text: &str) -> Option<i64> {
    match text.strip_prefix("0x") {
        Some(hex) => i64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Vendor code of a vendor string, in the order of the x86 and ARM ids.
pub(super) fn vendor_code(name: &str) -> i32 {
    match name {
        "GenuineIntel" => 1,
        "AuthenticAMD" => 2,
        "0x41" => 3,
        "HygonGenuine" => 4,
        "" => 0,
        _ => -1,
    }
}

/// `32K`, `1024K`, `8M` or plain bytes.
pub(super) fn parse_size(text: &str) -> Option<i32> {
    let text = text.trim();
    let (digits, unit) = match text.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((i, _)) => text.split_at(i),
        None => (text, ""),
    };
    let n: i32 = digits.parse().ok()?;
    match unit {
        "" => Some(n),
        "K" => n.checked_mul(1 << 10),
        "M" => n.checked_mul(1 << 20),
        "G" => n.checked_mul(1 << 30),
        _ => None,
    }
}

/// Number of CPUs in a list such as `0-3,8,10-11`.
pub(super) fn parse_cpu_list(text: &str) -> usize {
    text.trim()
        .split(',')
        .filter(|range| !range.is_empty())
        .map(|range| match range.split_once('-') {
            Some((lo, hi)) => match (lo.parse::<usize>(), hi.parse::<usize>()) {
                (Ok(lo), Ok(hi)) if hi >= lo => hi - lo + 1,
                _ => 0,
            },
            None => 1,
        })
        .sum()
}

/// One `cacheN/indexM` directory.
#[derive(Clone, Debug, Default, PartialEq)]
pub(super) struct CacheIndex {
    pub level: usize,
    /// `Data`, `Instruction` or `Unified`.
    pub ty: String,
    pub size: i32,
    pub line_size: i32,
    pub sets: i32,
    pub ways: i32,
}

/// Lays the caches out by level, up to the fixed record size.
pub(super) fn cache_levels(indexes: &[CacheIndex], levels: &mut [RawLevel; MAX_LEVELS]) -> usize {
    let mut num_levels = 0;
    for index in indexes {
        let Some(level) = index.level.checked_sub(1).filter(|level| *level < MAX_LEVELS) else {
            continue;
        };
        let kind = match index.ty.as_str() {
            "Data" => MH_TYPE_DATA,
            "Instruction" => MH_TYPE_INST,
            "Unified" => MH_TYPE_UNIFIED,
            _ => continue,
        };
        let Some(slot) = levels[level]
            .cache
            .iter_mut()
            .find(|cache| cache.ty == MH_TYPE_EMPTY)
        else {
            continue;
        };

        *slot = RawCache {
            ty: kind,
            size: index.size,
            line_size: index.line_size,
            num_lines: if index.line_size > 0 {
                index.size / index.line_size
            } else {
                0
            },
            associativity: if index.sets == 1 {
                FULLY_ASSOCIATIVE
            } else {
                index.ways
            },
        };
        num_levels = num_levels.max(level + 1);
    }
    num_levels
}

fn read_trimmed(path: impl AsRef<Path>) -> Result<String> {
    Ok(fs::read_to_string(path)?.trim().to_string())
}

fn read_caches(cpu: &Path) -> Vec<CacheIndex> {
    let Ok(dir) = fs::read_dir(cpu.join("cache")) else {
        return vec![];
    };

    let mut indexes = dir
        .flatten()
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("index"))
        .filter_map(|entry| {
            let path = entry.path();
            let field = |name: &str| read_trimmed(path.join(name)).ok();
            let int = |name: &str| field(name).and_then(|text| text.parse().ok()).unwrap_or(0);
            Some(CacheIndex {
                level: field("level")?.parse().ok()?,
                ty: field("type")?,
                size: field("size").as_deref().and_then(parse_size).unwrap_or(0),
                line_size: int("coherency_line_size"),
                sets: int("number_of_sets"),
                ways: int("ways_of_associativity"),
            })
        })
        .collect::<Vec<_>>();
    indexes.sort_by_key(|index| index.level);
    indexes
}

fn sysconf(name: libc::c_int) -> i32 {
    let n = unsafe { libc::sysconf(name) };
    n.max(0) as _
}

/// Reads the CPU identity, counts and cache hierarchy.
///
/// Returns `None` if `/proc/cpuinfo` cannot be read.
pub(super) fn hardware_info() -> Option<RawHardwareInfo> {
    let cpuinfo = fs::read_to_string("/proc/cpuinfo").ok()?;
    let id = parse_cpuinfo(&cpuinfo);

    let cpus = sysconf(libc::_SC_NPROCESSORS_ONLN);
    let total_cpus = sysconf(libc::_SC_NPROCESSORS_CONF);

    let cpu0 = Path::new(CPU_DIR).join("cpu0");
    let threads = read_trimmed(cpu0.join("topology/thread_siblings_list"))
        .map(|list| parse_cpu_list(&list))
        .unwrap_or(1)
        .max(1) as i32;

    let packages = (0..total_cpus)
        .filter_map(|cpu| {
            let path = format!("{}/cpu{}/topology/physical_package_id", CPU_DIR, cpu);
            read_trimmed(path).ok()
        })
        .collect::<HashSet<_>>();
    let sockets = packages.len().max(1) as i32;

    let numa_nodes = fs::read_dir("/sys/devices/system/node")
        .map(|dir| {
            dir.flatten()
                .filter(|entry| {
                    let name = entry.file_name();
                    let name = name.to_string_lossy();
                    name.strip_prefix("node")
                        .is_some_and(|id| id.parse::<u32>().is_ok())
                })
                .count()
        })
        .unwrap_or(1)
        .max(1) as i32;

    let mut levels = [RawLevel::default(); MAX_LEVELS];
    let num_levels = cache_levels(&read_caches(&cpu0), &mut levels);

    let max_khz = read_trimmed(cpu0.join("cpufreq/cpuinfo_max_freq"))
        .ok()
        .and_then(|text| text.parse::<i32>().ok());
    let clock_mhz = max_khz.map(|khz| khz / 1000).unwrap_or(id.mhz as i32);

    Some(RawHardwareInfo {
        cpus,
        threads,
        cores: (cpus / threads / sockets).max(1),
        sockets,
        numa_nodes,
        total_cpus,
        vendor: vendor_code(&id.vendor_name),
        vendor_name: id.vendor_name,
        model: id.model,
        model_name: id.model_name,
        revision: id.revision,
        cpuid_family: id.family,
        cpuid_model: id.model,
        cpuid_stepping: id.stepping,
        mhz: id.mhz,
        clock_mhz,
        num_levels: num_levels as i32,
        levels,
    })
}

/// Parses `/proc/self/status` and `/proc/self/statm` into kilobytes.
pub(super) fn parse_dmem(status: &str, statm: &str, pagesize: u64) -> DynMemInfo {
    let mut info = DynMemInfo {
        pagesize,
        ..Default::default()
    };
    for line in status.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let kb = value
            .split_whitespace()
            .next()
            .and_then(|kb| kb.parse().ok())
            .unwrap_or(0);
        match key {
            "VmPeak" => info.peak = kb,
            "VmSize" => info.size = kb,
            "VmLck" => info.locked = kb,
            "VmHWM" => info.high_water_mark = kb,
            "VmRSS" => info.resident = kb,
            "VmData" => info.heap = kb,
            "VmStk" => info.stack = kb,
            "VmExe" => info.text = kb,
            "VmLib" => info.library = kb,
            "VmPTE" => info.pte = kb,
            _ => (),
        }
    }

    // size resident shared text lib data dt, in pages
    if let Some(shared) = statm
        .split_whitespace()
        .nth(2)
        .and_then(|pages| pages.parse::<u64>().ok())
    {
        info.shared = shared * pagesize / 1024;
    }
    info
}

pub(super) fn dmem_info() -> Result<DynMemInfo> {
    let status = fs::read_to_string("/proc/self/status")?;
    let statm = fs::read_to_string("/proc/self/statm")?;
    Ok(parse_dmem(&status, &statm, *PAGE_SIZE as u64))
}

/// Finds the text, data and bss ranges of `exe` in `/proc/self/maps`.
///
/// The bss is the anonymous writable mapping right after the data, if any.
pub(super) fn parse_maps(maps: &str, exe: &Path) -> Option<AddressMap> {
    let mut map = AddressMap {
        name: exe.file_name()?.to_string_lossy().into_owned(),
        ..Default::default()
    };
    let mut found = false;
    let mut after_data = false;

    for line in maps.lines() {
        let mut fields = line.split_whitespace();
        let (Some(range), Some(perms)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Some((start, end)) = range.split_once('-') else {
            continue;
        };
        let (Ok(start), Ok(end)) = (
            usize::from_str_radix(start, 16),
            usize::from_str_radix(end, 16),
        ) else {
            continue;
        };
        let path = fields.nth(3);

        if path == exe.to_str() {
            found = true;
            after_data = false;
            if perms.starts_with("r-x") && map.text_start == 0 {
                map.text_start = start;
                map.text_end = end;
            } else if perms.starts_with("rw") {
                if map.data_start == 0 {
                    map.data_start = start;
                }
                map.data_end = end;
                after_data = true;
            }
        } else {
            if after_data && path.is_none() && perms.starts_with("rw") && start == map.data_end {
                map.bss_start = start;
                map.bss_end = end;
            }
            after_data = false;
        }
    }

    found.then_some(map)
}

pub(super) fn executable_info() -> Option<ExecutableInfo> {
    let full_name: PathBuf = fs::read_link("/proc/self/exe").ok()?;
    let maps = fs::read_to_string("/proc/self/maps").ok()?;
    let address_info = parse_maps(&maps, &full_name)?;
    Some(ExecutableInfo {
        full_name,
        address_info,
    })
}

/// Value of `/proc/sys/kernel/perf_event_paranoid`, `None` on kernels without perf events.
///
/// Above 1, unprivileged users may only count in user space.
pub(super) fn perf_event_paranoid() -> Option<i32> {
    read_trimmed("/proc/sys/kernel/perf_event_paranoid")
        .ok()
        .and_then(|text| text.parse().ok())
}
