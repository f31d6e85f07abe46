use std::path::Path;

use super::sysfs::*;
use super::*;
use crate::event::preset;
use crate::Library;

const CPUINFO_X86: &str = "\
processor	: 0
vendor_id	: GenuineIntel
cpu family	: 6
model		: 140
model name	: 11th Gen Intel(R) Core(TM) i7-1165G7 @ 2.80GHz
stepping	: 1
cpu MHz		: 2803.204

processor	: 1
vendor_id	: GenuineIntel
model		: 999
";

const CPUINFO_ARM: &str = "\
processor	: 0
BogoMIPS	: 48.00
CPU implementer	: 0x41
CPU architecture: 8
CPU variant	: 0x3
CPU part	: 0xd0c
CPU revision	: 1
";

#[test]
fn test_cpuinfo() {
    let id = parse_cpuinfo(CPUINFO_X86);
    assert_eq!(id.vendor_name, "GenuineIntel");
    assert_eq!(id.family, 6);
    assert_eq!(id.model, 140);
    assert_eq!(id.stepping, 1);
    assert_eq!(id.revision, 1.0);
    assert!((id.mhz - 2803.204).abs() < 1e-3);
    assert!(id.model_name.starts_with("11th Gen"));
    assert_eq!(vendor_code(&id.vendor_name), 1);

    let id = parse_cpuinfo(CPUINFO_ARM);
    assert_eq!(id.vendor_name, "0x41");
    assert_eq!(id.family, 8);
    assert_eq!(id.model, 0xd0c);
    assert_eq!(id.stepping, 3);
    assert_eq!(id.revision, 1.0);
    assert_eq!(vendor_code(&id.vendor_name), 3);
}

#[test]
fn test_sizes_and_lists() {
    assert_eq!(parse_size("48K"), Some(48 * 1024));
    assert_eq!(parse_size("12M\n"), Some(12 << 20));
    assert_eq!(parse_size("4096"), Some(4096));
    assert_eq!(parse_size("K"), None);
    assert_eq!(parse_size("3T"), None);

    assert_eq!(parse_cpu_list("0,4\n"), 2);
    assert_eq!(parse_cpu_list("0-3,8,10-11"), 7);
    assert_eq!(parse_cpu_list("5"), 1);
    assert_eq!(parse_cpu_list(""), 0);
}

#[test]
fn test_cache_levels() {
    let index = |level, ty: &str, size, sets, ways| CacheIndex {
        level,
        ty: ty.to_string(),
        size,
        line_size: 64,
        sets,
        ways,
    };
    let indexes = [
        index(1, "Data", 48 << 10, 64, 12),
        index(1, "Instruction", 32 << 10, 64, 8),
        index(2, "Unified", 1280 << 10, 1024, 20),
        index(3, "Unified", 12 << 20, 1, 0),
        index(4, "Weird", 1 << 20, 64, 8),
        index(9, "Unified", 1 << 20, 64, 8),
    ];

    let mut levels = [RawLevel::default(); MAX_LEVELS];
    assert_eq!(cache_levels(&indexes, &mut levels), 3);
    assert_eq!(levels[0].cache[0].ty, MH_TYPE_DATA);
    assert_eq!(levels[0].cache[1].ty, MH_TYPE_INST);
    assert_eq!(levels[0].cache[0].num_lines, 768);
    assert_eq!(levels[1].cache[0].associativity, 20);
    assert_eq!(levels[2].cache[0].associativity, FULLY_ASSOCIATIVE);
    assert_eq!(levels[3], RawLevel::default());

    let raw = RawHardwareInfo {
        num_levels: 3,
        levels,
        ..Default::default()
    };
    let info = HardwareInfo::from(&raw);
    assert_eq!(info.memory_hierarchy[0].cache.len(), 2);
    assert!(info.memory_hierarchy[0].tlb.is_empty());
    assert_eq!(
        info.memory_hierarchy[2].cache[0].associativity,
        Associativity::Full
    );
}

#[test]
fn test_dmem() {
    let status = "\
Name:	cat
VmPeak:	    8052 kB
VmSize:	    8052 kB
VmLck:	       0 kB
VmHWM:	    1020 kB
VmRSS:	    1020 kB
VmData:	     360 kB
VmStk:	     132 kB
VmExe:	      20 kB
VmLib:	    1660 kB
VmPTE:	      52 kB
Threads:	1
";
    let dmem = parse_dmem(status, "2013 255 230 5 0 121 0\n", 4096);
    assert_eq!(dmem.peak, 8052);
    assert_eq!(dmem.resident, 1020);
    assert_eq!(dmem.high_water_mark, 1020);
    assert_eq!(dmem.heap, 360);
    assert_eq!(dmem.stack, 132);
    assert_eq!(dmem.text, 20);
    assert_eq!(dmem.library, 1660);
    assert_eq!(dmem.pte, 52);
    assert_eq!(dmem.shared, 920);
    assert_eq!(dmem.pagesize, 4096);
}

#[test]
fn test_maps() {
    let maps = "\
55d0c0a00000-55d0c0a02000 r--p 00000000 fd:01 1234   /usr/bin/cat
55d0c0a02000-55d0c0a07000 r-xp 00002000 fd:01 1234   /usr/bin/cat
55d0c0a07000-55d0c0a0a000 r--p 00007000 fd:01 1234   /usr/bin/cat
55d0c0a0a000-55d0c0a0b000 rw-p 00009000 fd:01 1234   /usr/bin/cat
55d0c0a0b000-55d0c0a0c000 rw-p 00000000 00:00 0
55d0c1c8f000-55d0c1cb0000 rw-p 00000000 00:00 0      [heap]
7f1e2a000000-7f1e2a028000 r-xp 00028000 fd:01 5678   /usr/lib/libc.so.6
";
    let map = parse_maps(maps, Path::new("/usr/bin/cat")).unwrap();
    assert_eq!(map.name, "cat");
    assert_eq!(map.text_start, 0x55d0c0a02000);
    assert_eq!(map.text_end, 0x55d0c0a07000);
    assert_eq!(map.data_start, 0x55d0c0a0a000);
    assert_eq!(map.data_end, 0x55d0c0a0b000);
    assert_eq!(map.bss_start, 0x55d0c0a0b000);
    assert_eq!(map.bss_end, 0x55d0c0a0c000);

    assert!(parse_maps(maps, Path::new("/usr/bin/dog")).is_none());
}

#[test]
fn test_opts_target() {
    let opts = Opts::default();
    assert!(opts.target.is_task());
    assert!(opts.probe);

    assert_eq!(opts.target.granularity(), Granularity::Thread);

    let target: crate::config::Target = (crate::config::Cpu(0), crate::config::All).into();
    assert!(!target.is_task());
    assert_eq!(target.granularity(), Granularity::System);
}

#[test]
fn test_unprobed_natives_are_available() {
    let driver = PerfDriver::new(Opts {
        probe: false,
        num_counters: Some(6),
        ..Default::default()
    });
    let cpu = driver.cpu(Domain::USER);
    assert_eq!(cpu.info.num_counters, 6);
    assert_eq!(cpu.info.num_native_events, event::hardware().len());
    assert!(cpu.table.iter().all(|(_, it)| it.available));

    let cycles = cpu.table.lookup("cycles").unwrap();
    assert_eq!(
        cpu.config(cycles).unwrap(),
        EventConfig::from(Hardware::CpuCycle)
    );

    let software = driver.software(Domain::USER);
    assert!(!software.info.features.cpu);
    assert!(software.table.lookup("task-clock").is_some());
}

// The tests below need access to hardware counters.

#[test]
#[ignore]
fn test_count_instructions() {
    let library = Library::init(PerfDriver::default()).unwrap();
    let mut set = library.create_event_set().unwrap();
    set.add_events(&[preset::TOT_INS, preset::TOT_CYC]).unwrap();

    set.start().unwrap();
    let mut sum = 0u64;
    for i in 0..100_000 {
        sum = std::hint::black_box(sum.wrapping_add(i));
    }
    let mut values = [0; 2];
    set.stop(&mut values).unwrap();
    assert!(values[0] > 100_000);
    assert!(values[1] > 0);
}

#[test]
#[ignore]
fn test_multiplexed_counts() {
    let library = Library::init(PerfDriver::default()).unwrap();
    let mut set = library.create_event_set().unwrap();
    set.set_multiplex().unwrap();
    set.add_events(&[
        preset::TOT_INS,
        preset::TOT_CYC,
        preset::BR_INS,
        preset::BR_MSP,
        preset::L1_DCM,
        preset::REF_CYC,
    ])
    .unwrap();

    set.start().unwrap();
    let mut sum = 0u64;
    for i in 0..1_000_000 {
        sum = std::hint::black_box(sum.wrapping_add(i));
    }
    let mut values = [0; 6];
    set.stop(&mut values).unwrap();
    assert!(values[0] > 0);
    assert!(values.iter().all(|value| *value >= 0));
}

#[test]
#[ignore]
fn test_software_events() {
    let library = Library::init(PerfDriver::default()).unwrap();
    let mut set = library.create_event_set().unwrap();
    set.add_named_event("task-clock").unwrap();
    set.start().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(1));
    let mut values = [0; 1];
    set.stop(&mut values).unwrap();
    assert!(values[0] > 0);
}

#[test]
#[ignore]
fn test_host_introspection() {
    let driver = PerfDriver::default();
    let info = HardwareInfo::from(&driver.hardware_info().unwrap());
    assert!(info.total_cpus > 0);
    assert!(!info.memory_hierarchy.is_empty());

    let dmem = driver.dmem_info().unwrap();
    assert!(dmem.resident > 0);
    let exe = driver.executable_info().unwrap();
    assert!(exe.address_info.text_start < exe.address_info.text_end);

    let t0 = driver.real_usec();
    let c0 = driver.real_cyc();
    std::thread::sleep(std::time::Duration::from_millis(1));
    assert!(driver.real_usec() > t0);
    assert!(driver.real_cyc() > c0);
    assert!(driver.virt_usec() > 0);
}
