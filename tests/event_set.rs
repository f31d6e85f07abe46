use perfapi::driver::sim::{SimClock, SimConfig, Simulated};
use perfapi::event::preset;
use perfapi::topology::{ComponentId, Domain};
use perfapi::{ErrorKind, EventSet, Library, State};

fn library_with(config: SimConfig) -> (Library, SimClock) {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = config.clock.clone();
    (Library::init(Simulated::new(config)).unwrap(), clock)
}

fn library() -> (Library, SimClock) {
    library_with(SimConfig::default())
}

#[test]
fn test_is_send_and_sync() {
    fn send_sync<T: Send + Sync>() {}
    fn send<T: Send>() {}
    send_sync::<Library>();
    send::<EventSet>();
}

#[test]
fn test_lifecycle() {
    let (library, clock) = library();
    let mut set = library.create_event_set().unwrap();
    assert_eq!(set.state(), State::Allocated);

    set.add_events(&[preset::TOT_INS, preset::TOT_CYC]).unwrap();
    assert_eq!(set.state(), State::Populated);

    set.start().unwrap();
    assert_eq!(set.state(), State::Counting);
    clock.advance(10);

    let mut values = [0; 2];
    set.read(&mut values).unwrap();
    assert_eq!(values, [15_000, 10_000]);
    clock.advance(10);
    set.stop(&mut values).unwrap();
    assert_eq!(values, [30_000, 20_000]);
    assert_eq!(set.state(), State::Populated);

    set.remove_event(preset::TOT_INS).unwrap();
    assert_eq!(set.num_events().unwrap(), 1);
    assert_eq!(set.events().unwrap(), [preset::TOT_CYC]);

    set.destroy().unwrap();
    assert_eq!(set.state(), State::Destroyed);
    assert_eq!(set.destroy().unwrap_err().kind(), ErrorKind::InvalidHandle);
    assert_eq!(set.num_events().unwrap_err().kind(), ErrorKind::InvalidHandle);
    assert_eq!(
        set.add_event(preset::TOT_INS).unwrap_err().kind(),
        ErrorKind::InvalidHandle
    );
    assert_eq!(set.start().unwrap_err().kind(), ErrorKind::InvalidHandle);
    assert_eq!(set.read(&mut values).unwrap_err().kind(), ErrorKind::InvalidHandle);
    assert_eq!(
        set.accumulate(&mut values).unwrap_err().kind(),
        ErrorKind::InvalidHandle
    );
    assert_eq!(set.stop(&mut values).unwrap_err().kind(), ErrorKind::InvalidHandle);
    assert_eq!(set.reset().unwrap_err().kind(), ErrorKind::InvalidHandle);
    assert_eq!(set.cleanup().unwrap_err().kind(), ErrorKind::InvalidHandle);
    assert_eq!(set.set_multiplex().unwrap_err().kind(), ErrorKind::InvalidHandle);
    assert_eq!(set.get_multiplex().unwrap_err().kind(), ErrorKind::InvalidHandle);
    assert_eq!(
        set.remove_event(preset::TOT_CYC).unwrap_err().kind(),
        ErrorKind::InvalidHandle
    );
    assert_eq!(set.state(), State::Destroyed);
}

#[test]
fn test_failed_stop_still_stops() {
    let (library, clock) = library_with(SimConfig {
        fail_reads: true,
        ..Default::default()
    });
    let mut set = library.create_event_set().unwrap();
    set.add_events(&[preset::TOT_INS, preset::TOT_CYC]).unwrap();
    set.start().unwrap();
    clock.advance(10);

    let mut values = [-1; 2];
    let err = set.read(&mut values).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CounterConflict);
    assert_eq!(set.state(), State::Counting);

    let err = set.stop(&mut values).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CounterConflict);
    assert_eq!(values, [-1, -1]);
    assert_eq!(set.state(), State::Populated);

    // The component is free again and the set can be torn down.
    let mut other = library.create_event_set().unwrap();
    other.add_event(preset::TOT_CYC).unwrap();
    other.start().unwrap();
    assert_eq!(
        set.stop(&mut values).unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    set.cleanup().unwrap();
    set.destroy().unwrap();
}

#[test]
fn test_capacity() {
    let (library, _) = library();
    let plain = [
        preset::TOT_CYC,
        preset::TOT_INS,
        preset::FP_INS,
        preset::LD_INS,
        preset::SR_INS,
        preset::BR_INS,
    ];

    let mut set = library.create_event_set().unwrap();
    set.add_events(&plain[..4]).unwrap();
    let err = set.add_event(plain[4]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TooManyEvents);
    assert_eq!(set.num_events().unwrap(), 4);

    let mut mpx = library.create_event_set().unwrap();
    mpx.set_multiplex().unwrap();
    assert!(mpx.get_multiplex().unwrap());
    mpx.add_events(&plain).unwrap();
    assert_eq!(mpx.num_events().unwrap(), 6);
}

#[test]
fn test_multiplex_capacity() {
    let (library, _) = library_with(SimConfig {
        num_mpx_counters: 3,
        ..Default::default()
    });
    let mut set = library.create_event_set().unwrap();
    set.set_multiplex().unwrap();
    let err = set
        .add_events(&[preset::TOT_CYC, preset::TOT_INS, preset::LD_INS, preset::SR_INS])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TooManyEvents);
    assert_eq!(set.state(), State::Allocated);
}

#[test]
fn test_add_is_all_or_nothing() {
    let (library, _) = library();
    let mut set = library.create_event_set().unwrap();

    // TLB_IM maps onto a native that is not countable.
    let err = set.add_events(&[preset::TOT_INS, preset::TLB_IM]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEvent);
    assert_eq!(set.num_events().unwrap(), 0);
    assert_eq!(set.state(), State::Allocated);

    set.add_event(preset::L1_DCM).unwrap();
    // Both natives need the same register.
    let err = set.add_events(&[preset::TOT_INS, preset::L2_TCM]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CounterConflict);
    assert_eq!(set.events().unwrap(), [preset::L1_DCM]);

    let err = set.add_event(preset::L1_DCM).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CounterConflict);
    let err = set.add_events(&[preset::BR_INS, preset::BR_INS]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CounterConflict);

    let dram = library.event_code("SIM_DRAM_READS").unwrap();
    let err = set.add_event(dram).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CounterConflict);

    let err = set.add_named_event("PAPI_L3_TCM").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEvent);
    assert_eq!(set.events().unwrap(), [preset::L1_DCM]);
}

#[test]
fn test_state_machine() {
    let (library, _) = library();
    let mut set = library.create_event_set().unwrap();
    let mut values = [0; 4];

    assert_eq!(set.start().unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(set.read(&mut values).unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(set.stop(&mut values).unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(
        set.accumulate(&mut values).unwrap_err().kind(),
        ErrorKind::InvalidState
    );

    set.add_event(preset::TOT_CYC).unwrap();
    set.start().unwrap();
    for err in [
        set.start().unwrap_err(),
        set.add_event(preset::TOT_INS).unwrap_err(),
        set.remove_event(preset::TOT_CYC).unwrap_err(),
        set.cleanup().unwrap_err(),
        set.destroy().unwrap_err(),
        set.set_multiplex().unwrap_err(),
        set.assign_component(ComponentId::CPU).unwrap_err(),
        set.set_domain(Domain::USER).unwrap_err(),
    ] {
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
    assert_eq!(set.state(), State::Counting);

    set.stop(&mut values).unwrap();
    // Multiplexing must be chosen before the first plain start.
    set.cleanup().unwrap();
    assert_eq!(set.state(), State::Allocated);
    assert_eq!(set.set_multiplex().unwrap_err().kind(), ErrorKind::InvalidState);

    set.add_event(preset::TOT_CYC).unwrap();
    assert_eq!(set.set_multiplex().unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(
        set.assign_component(ComponentId(1)).unwrap_err().kind(),
        ErrorKind::InvalidState
    );
}

#[test]
fn test_remove_keeps_order() {
    let (library, _) = library();
    let mut set = library.create_event_set().unwrap();
    set.add_events(&[preset::TOT_INS, preset::TOT_CYC, preset::BR_INS])
        .unwrap();

    let err = set.remove_event(preset::FP_INS).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEvent);
    let err = set
        .remove_events(&[preset::BR_INS, preset::FP_INS])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEvent);
    assert_eq!(set.num_events().unwrap(), 3);

    set.remove_event(preset::TOT_CYC).unwrap();
    assert_eq!(set.events().unwrap(), [preset::TOT_INS, preset::BR_INS]);

    set.remove_events(&[preset::BR_INS, preset::TOT_INS]).unwrap();
    assert_eq!(set.state(), State::Allocated);
    assert_eq!(set.start().unwrap_err().kind(), ErrorKind::InvalidState);
}

#[test]
fn test_accumulate_is_additive() {
    let (library, clock) = library();
    let mut set = library.create_event_set().unwrap();
    set.add_events(&[preset::TOT_INS, preset::TOT_CYC]).unwrap();
    set.start().unwrap();

    let mut total = [0; 2];
    clock.advance(5);
    set.accumulate(&mut total).unwrap();
    assert_eq!(total, [7_500, 5_000]);
    clock.advance(7);
    set.accumulate(&mut total).unwrap();
    assert_eq!(total, [18_000, 12_000]);

    // Accumulating resets the counters.
    clock.advance(1);
    let mut values = [0; 2];
    set.read(&mut values).unwrap();
    assert_eq!(values, [1_500, 1_000]);
}

#[test]
fn test_derived_values() {
    let (library, clock) = library();
    let mut set = library.create_event_set().unwrap();
    set.add_events(&[preset::FP_OPS, preset::BR_PRC, preset::FP_INS])
        .unwrap();
    set.start().unwrap();
    clock.advance(2);

    let mut values = [0; 3];
    set.stop(&mut values).unwrap();
    assert_eq!(values, [600, 480, 400]);

    set.cleanup().unwrap();
    set.add_events(&[preset::L1_TCM, preset::L1_DCM]).unwrap();
    set.start().unwrap();
    clock.advance(2);
    set.stop(&mut values).unwrap();
    assert_eq!(values[..2], [90, 80]);
}

#[test]
fn test_restart_counts_from_zero() {
    let (library, clock) = library();
    let mut set = library.create_event_set().unwrap();
    set.add_event(preset::TOT_CYC).unwrap();

    let mut values = [0; 1];
    set.start().unwrap();
    clock.advance(4);
    set.stop(&mut values).unwrap();
    clock.advance(100);
    set.start().unwrap();
    clock.advance(1);
    set.stop(&mut values).unwrap();
    assert_eq!(values, [1_000]);

    set.start().unwrap();
    clock.advance(5);
    set.reset().unwrap();
    clock.advance(2);
    set.read(&mut values).unwrap();
    assert_eq!(values, [2_000]);
}

#[test]
fn test_buffer_too_small() {
    let (library, _) = library();
    let mut set = library.create_event_set().unwrap();
    set.add_events(&[preset::TOT_INS, preset::TOT_CYC]).unwrap();
    set.start().unwrap();

    let mut short = [0; 1];
    assert_eq!(set.read(&mut short).unwrap_err().kind(), ErrorKind::BufferTooSmall);
    assert_eq!(set.stop(&mut short).unwrap_err().kind(), ErrorKind::BufferTooSmall);
    assert_eq!(set.state(), State::Counting);
}

#[test]
fn test_running_sets_conflict() {
    let (library, _) = library();
    let mut a = library.create_event_set().unwrap();
    let mut b = library.create_event_set().unwrap();
    a.add_event(preset::TOT_INS).unwrap();
    b.add_event(preset::TOT_CYC).unwrap();

    a.start().unwrap();
    assert_eq!(b.start().unwrap_err().kind(), ErrorKind::CounterConflict);
    assert_eq!(b.state(), State::Populated);

    let mut values = [0; 1];
    a.stop(&mut values).unwrap();
    b.start().unwrap();

    // Dropping a running set frees the component.
    drop(b);
    a.start().unwrap();
}

#[test]
fn test_multiplexed_sets_share() {
    let (library, clock) = library();
    let mut a = library.create_event_set().unwrap();
    let mut b = library.create_event_set().unwrap();
    for set in [&mut a, &mut b] {
        set.set_multiplex().unwrap();
        set.add_events(&[preset::TOT_INS, preset::L1_DCM, preset::L2_TCM])
            .unwrap();
    }

    a.start().unwrap();
    b.start().unwrap();
    clock.advance(1);
    let mut values = [0; 3];
    b.read(&mut values).unwrap();
    assert_eq!(values, [1_500, 40, 12]);

    let mut plain = library.create_event_set().unwrap();
    plain.add_event(preset::TOT_CYC).unwrap();
    assert_eq!(plain.start().unwrap_err().kind(), ErrorKind::CounterConflict);
}

#[test]
fn test_other_components_run_alongside() {
    let (library, clock) = library();
    let mut cpu = library.create_event_set().unwrap();
    cpu.add_event(preset::TOT_CYC).unwrap();

    let mut uncore = library.create_event_set().unwrap();
    uncore.assign_component(ComponentId(1)).unwrap();
    assert_eq!(
        uncore.set_multiplex().unwrap_err().kind(),
        ErrorKind::UnsupportedOperation
    );
    assert!(!uncore.get_multiplex().unwrap());
    uncore.add_named_event("SIM_DRAM_READS").unwrap();
    assert_eq!(uncore.component(), Some(ComponentId(1)));

    cpu.start().unwrap();
    uncore.start().unwrap();
    clock.advance(3);
    let mut values = [0; 1];
    uncore.stop(&mut values).unwrap();
    assert_eq!(values, [240]);

    let err = uncore.add_event(preset::TOT_INS).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CounterConflict);

    uncore.cleanup().unwrap();
    assert_eq!(uncore.component(), Some(ComponentId(1)));
    assert_eq!(uncore.num_events().unwrap(), 0);
}

#[test]
fn test_assign_component() {
    let (library, _) = library();
    let mut set = library.create_event_set().unwrap();
    assert_eq!(set.component(), None);
    let err = set.assign_component(ComponentId(9)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidComponent);
    assert_eq!(set.component(), None);

    set.set_multiplex().unwrap();
    assert_eq!(set.component(), Some(ComponentId::CPU));
    let err = set.assign_component(ComponentId(1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);

    set.cleanup().unwrap();
    assert!(!set.get_multiplex().unwrap());
    set.assign_component(ComponentId(1)).unwrap();
}

#[test]
fn test_domain() {
    let (library, _) = library();
    let mut set = library.create_event_set().unwrap();
    assert_eq!(set.domain().unwrap(), Domain::USER);

    let err = set.set_domain(Domain::ALL).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
    let err = set.set_domain(Domain::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    set.add_event(preset::TOT_CYC).unwrap();
    set.set_domain(Domain::KERNEL).unwrap();
    assert_eq!(set.domain().unwrap(), Domain::KERNEL);
    set.start().unwrap();
}

#[test]
fn test_handles_run_out() {
    let (library, _) = library_with(SimConfig {
        max_sets: 2,
        ..Default::default()
    });
    let a = library.create_event_set().unwrap();
    let _b = library.create_event_set().unwrap();
    let err = library.create_event_set().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceExhausted);

    drop(a);
    library.create_event_set().unwrap();
}

#[test]
fn test_destroy_populated_set() {
    let (library, _) = library_with(SimConfig {
        max_sets: 1,
        ..Default::default()
    });
    let mut set = library.create_event_set().unwrap();
    set.add_event(preset::TOT_INS).unwrap();
    set.destroy().unwrap();
    assert_eq!(set.state(), State::Destroyed);
    assert_eq!(set.events().unwrap_err().kind(), ErrorKind::InvalidHandle);

    // The handle went back to the driver.
    library.create_event_set().unwrap();
}
