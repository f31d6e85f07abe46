use std::collections::HashSet;

use perfapi::driver::sim::{SimConfig, Simulated};
use perfapi::event::{preset, Categories};
use perfapi::topology::ComponentId;
use perfapi::{ErrorKind, Event, EventMask, EventModifier, Library};

fn library() -> Library {
    let _ = env_logger::builder().is_test(true).try_init();
    Library::init(Simulated::new(SimConfig::default())).unwrap()
}

#[test]
fn test_preset_enumeration() {
    let library = library();
    let all = library
        .enumerate(EventMask::PRESET, EventModifier::All)
        .unwrap();
    assert_eq!(all.len(), preset::all().len());
    assert_eq!(all[0], preset::L1_DCM);

    let available = library
        .enumerate(EventMask::PRESET, EventModifier::Available)
        .unwrap();
    // Twenty definitions, two of which need the unavailable ITLB native.
    assert_eq!(available.len(), 18);
    assert!(available.contains(&preset::FP_OPS));
    assert!(!available.contains(&preset::TLB_IM));
    assert!(!available.contains(&preset::TLB_TL));
    assert!(available.iter().all(|event| all.contains(event)));

    let first = library
        .enumerate(EventMask::PRESET, EventModifier::First)
        .unwrap();
    assert_eq!(first, [preset::L1_DCM]);
}

#[test]
fn test_category_filter() {
    let library = library();
    let fp = Categories {
        floating_point: true,
        ..Default::default()
    };
    let events = library
        .enumerate(EventMask::PRESET, EventModifier::Categories(fp))
        .unwrap();

    // L1_DCM comes first in the table but is not a floating point event.
    assert!(!events.contains(&preset::L1_DCM));
    assert!(events.contains(&preset::FP_OPS));
    assert!(events.contains(&preset::FMA_INS));
    for event in &events {
        let categories = preset::lookup(*event).unwrap().categories();
        assert!(categories.floating_point, "{:?}", event);
    }

    let cache = Categories {
        l1: true,
        ..Default::default()
    };
    let natives = library
        .enumerate(EventMask::NATIVE, EventModifier::Categories(cache))
        .unwrap();
    let names = natives
        .iter()
        .map(|event| library.event_name(*event).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(names, ["SIM_L1D_MISSES", "SIM_L1I_MISSES"]);
}

#[test]
fn test_empty_category_filter() {
    let library = library();
    let empty = EventModifier::Categories(Categories::default());
    for mask in [EventMask::PRESET, EventMask::NATIVE] {
        let mut events = library.events(mask, empty);
        let err = events.next().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(events.next().is_none());
    }
    let err = library.enumerate(EventMask::PRESET, empty).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_native_enumeration() {
    let library = library();
    let all = library
        .enumerate(EventMask::NATIVE, EventModifier::All)
        .unwrap();
    assert_eq!(all.len(), 15);
    assert!(all.iter().all(|event| event.is_native()));
    assert!(all.iter().all(|event| event.component() == ComponentId::CPU));

    let available = library
        .enumerate(EventMask::NATIVE, EventModifier::Available)
        .unwrap();
    assert_eq!(available.len(), 14);
    let itlb = library.event_code("SIM_ITLB_MISSES").unwrap();
    assert!(all.contains(&itlb));
    assert!(!available.contains(&itlb));

    let uncore = library
        .enumerate(EventMask::component(ComponentId(1)), EventModifier::All)
        .unwrap();
    assert_eq!(uncore.len(), 2);
    assert!(uncore.iter().all(|event| event.component() == ComponentId(1)));
}

#[test]
fn test_names_round_trip() {
    let library = library();
    let mut seen = HashSet::new();
    for mask in [
        EventMask::PRESET,
        EventMask::NATIVE,
        EventMask::component(ComponentId(1)),
    ] {
        for event in library.events(mask, EventModifier::All) {
            let event = event.unwrap();
            let name = library.event_name(event).unwrap();
            assert_eq!(library.event_code(&name).unwrap(), event, "{}", name);
            assert!(seen.insert(name));
        }
    }
    assert_eq!(seen.len(), preset::all().len() + 17);
}

#[test]
fn test_unknown_names() {
    let library = library();
    for name in ["PAPI_NOPE", "NOPE", ""] {
        let err = library.event_code(name).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidEvent, "{:?}", name);
    }

    let err = library
        .event_name(Event::from_code(0x8000_0000 | 500))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEvent);
    let err = library
        .event_name(Event::native(ComponentId::CPU, 99))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEvent);
}

#[test]
fn test_stray_bits_are_not_aliases() {
    let library = library();
    // TOT_CYC with a component number in bits 26..=29.
    let stray = Event::from_code(preset::TOT_CYC.code() | 1 << 26);
    assert!(stray.is_preset());

    let err = library.event_name(stray).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEvent);
    let err = library.event_info(stray).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEvent);
    assert!(preset::lookup(stray).is_none());

    let mut set = library.create_event_set().unwrap();
    let err = set.add_event(stray).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEvent);
    assert!(err.to_string().contains("no preset"));
    assert_eq!(set.num_events().unwrap(), 0);

    let name = library.event_name(preset::TOT_CYC).unwrap();
    assert_eq!(library.event_code(&name).unwrap(), preset::TOT_CYC);
}

#[test]
fn test_iterator_is_fused() {
    let library = library();
    let mut events = library.events(EventMask::component(ComponentId(1)), EventModifier::All);
    assert!(events.next().is_some());
    assert!(events.next().is_some());
    assert!(events.next().is_none());
    assert!(events.next().is_none());

    let mut events = library.events(EventMask::component(ComponentId(9)), EventModifier::All);
    let err = events.next().unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidComponent);
    assert!(events.next().is_none());
}

#[test]
fn test_preset_info() {
    let library = library();

    let info = library.event_info(preset::FP_OPS).unwrap();
    assert_eq!(info.symbol, "PAPI_FP_OPS");
    assert_eq!(info.derived, "DERIVED_POSTFIX");
    assert_eq!(info.postfix, "N0|N1|2|*|+|");
    assert_eq!(info.name, ["SIM_FP_INSTRUCTIONS", "SIM_FP_FMA"]);
    assert_eq!(info.count(), 2);
    assert!(!info.note.is_empty());

    let info = library.event_info(preset::BR_PRC).unwrap();
    assert_eq!(info.derived, "DERIVED_SUB");

    let info = library.event_info(preset::TLB_IM).unwrap();
    assert_eq!(info.count(), 0);
    assert_eq!(info.derived, "NOT_DERIVED");

    // Known to the table, but the simulated CPU does not count it.
    let info = library.event_info(preset::L3_TCM).unwrap();
    assert_eq!(info.symbol, "PAPI_L3_TCM");
    assert_eq!(info.count(), 0);
}

#[test]
fn test_native_info() {
    let library = library();
    let event = library.event_code("SIM_L1I_MISSES").unwrap();
    let info = library.event_info(event).unwrap();
    assert_eq!(info.event_code, event.code());
    assert_eq!(info.symbol, "SIM_L1I_MISSES");
    assert_eq!(info.code, [0b1100]);
    assert_eq!(info.derived, "NOT_DERIVED");
    assert!(info.note.is_empty());

    let itlb = library.event_code("SIM_ITLB_MISSES").unwrap();
    assert_eq!(library.event_info(itlb).unwrap().note, "disabled by firmware");
}
