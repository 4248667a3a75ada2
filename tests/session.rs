use perfmon::error::*;
use perfmon::simulated::*;
use perfmon::*;

fn m1_session() -> Session<SimulatedPerfmon> {
    let vocab = ControlVocabulary::xnu();
    SessionConfig::default()
        .vocabulary(vocab.clone())
        .open_with(SimulatedPerfmon::apple_m1(vocab))
        .expect("failed to open session")
}

#[test]
fn test_full_protocol() {
    let mut session = m1_session();

    let layout = session.get_layout().expect("failed to get layout");
    assert_eq!(
        layout,
        Layout {
            register_count: 25,
            unit_count: 1
        }
    );

    let spec = session
        .negotiate(Spec::default())
        .expect("failed to negotiate");
    assert_eq!(session.spec(), Some(spec));

    let catalog = session.list_registers().expect("failed to list registers");
    assert_eq!(catalog.len(), 25);
    assert_eq!(catalog.name(0), Some("PMCR0"));
    assert_eq!(catalog.index_of("PMC0"), Some(M1_CYCLE_COUNTER));
    assert_eq!(catalog.name(24), Some("PMC9"));

    session
        .register_event(Event::new("test", 1, 2))
        .expect("failed to register event");
    session.configure().expect("failed to configure");

    let sample = session.sample().expect("failed to sample");
    assert_eq!(sample.len(), layout.sample_len());

    session.close().expect("failed to close session");
}

#[test]
fn test_layout_discovered_once() {
    let mut session = m1_session();

    let first = session.get_layout().unwrap();
    let second = session.get_layout().unwrap();

    assert_eq!(first, second);
    assert_eq!(session.device().calls(), &[ControlCall::GetLayout]);
}

#[test]
fn test_registers_listed_once() {
    let mut session = m1_session();
    session.get_layout().unwrap();

    let first = session.list_registers().unwrap().clone();
    session
        .device_mut()
        .fail_next(ControlCall::ListRegs, libc::EIO);
    let second = session.list_registers().unwrap().clone();

    assert_eq!(first, second);
    assert_eq!(
        session.device().calls(),
        &[ControlCall::GetLayout, ControlCall::ListRegs]
    );
}

#[test]
fn test_failed_listing_is_retried() {
    let mut session = m1_session();
    session.get_layout().unwrap();
    session
        .device_mut()
        .fail_next(ControlCall::ListRegs, libc::EIO);

    assert_eq!(
        session.list_registers().unwrap_err().call(),
        Some(ControlCall::ListRegs)
    );
    assert!(session.registers().is_none());
    assert_eq!(session.list_registers().unwrap().len(), 25);
}

#[test]
fn test_calls_before_layout_fail_fast() {
    let mut session = m1_session();

    assert_eq!(
        session.list_registers().unwrap_err().kind(),
        &ErrorKind::Precondition
    );
    assert_eq!(session.sample().unwrap_err().kind(), &ErrorKind::Precondition);
    assert_eq!(
        session
            .register_event(Event::new("test", 1, 2))
            .unwrap_err()
            .kind(),
        &ErrorKind::Precondition
    );

    // Nothing reached the device
    assert!(session.device().calls().is_empty());
}

#[test]
fn test_sample_shape() {
    let vocab = ControlVocabulary::xnu();
    let names: Vec<String> = (0..10).map(|i| format!("PMC{}", i)).collect();
    let device = SimulatedPerfmon::new(vocab.clone(), names, 8);
    let mut session = Session::with_device(device, vocab).expect("failed to open session");

    let layout = session.get_layout().unwrap();
    assert_eq!(layout.unit_count, 8);

    for _ in 0..3 {
        let sample = session.sample().expect("failed to sample");
        assert_eq!(sample.len(), 10 * 8);
        assert_eq!(sample.layout(), layout);
        assert!(sample.row(7).is_some());
        assert!(sample.row(8).is_none());
    }
}

#[test]
fn test_elapsed_cycles() {
    let mut session = m1_session();
    session.get_layout().unwrap();

    let before = session.sample().expect("failed to sample");

    let mut x = 0u64;
    for i in 0..100 {
        x = x.wrapping_add(i + 1);
    }
    assert_eq!(x, 5050);

    let after = session.sample().expect("failed to sample");

    let c1 = before.get(0, M1_CYCLE_COUNTER).unwrap();
    let c2 = after.get(0, M1_CYCLE_COUNTER).unwrap();
    assert!(c2.wrapping_sub(c1) > 0);
    assert_eq!(
        after.delta(&before, 0, M1_CYCLE_COUNTER),
        Some(M1_CYCLES_PER_SAMPLE)
    );
}

#[test]
fn test_elapsed_cycles_across_wraparound() {
    let vocab = ControlVocabulary::xnu();
    let device = SimulatedPerfmon::apple_m1(vocab.clone()).with_value(
        0,
        M1_CYCLE_COUNTER,
        u64::MAX - M1_CYCLES_PER_SAMPLE - 10,
    );
    let mut session = Session::with_device(device, vocab).unwrap();
    session.get_layout().unwrap();

    let before = session.sample().unwrap();
    let after = session.sample().unwrap();

    let c1 = before.get(0, M1_CYCLE_COUNTER).unwrap();
    let c2 = after.get(0, M1_CYCLE_COUNTER).unwrap();

    // The raw counter went backwards, the elapsed count did not.
    assert!(c2 < c1);
    assert_eq!(c2.wrapping_sub(c1), M1_CYCLES_PER_SAMPLE);
}

#[test]
fn test_sample_into_reuses_buffer() {
    let mut session = m1_session();
    let layout = session.get_layout().unwrap();

    let mut buf = SampleMatrix::new(layout);
    session.sample_into(&mut buf).expect("failed to sample");
    let first = buf.get(0, M1_CYCLE_COUNTER).unwrap();

    session.sample_into(&mut buf).expect("failed to sample");
    let second = buf.get(0, M1_CYCLE_COUNTER).unwrap();

    assert_eq!(second - first, M1_CYCLES_PER_SAMPLE);
}

#[test]
fn test_sample_into_wrong_layout() {
    let mut session = m1_session();
    session.get_layout().unwrap();

    let mut buf = SampleMatrix::new(Layout {
        register_count: 24,
        unit_count: 1,
    });

    assert_eq!(
        session.sample_into(&mut buf).unwrap_err().kind(),
        &ErrorKind::LayoutMismatch
    );
}

#[test]
fn test_negotiation_is_not_an_echo() {
    let vocab = ControlVocabulary::xnu();
    let device = SimulatedPerfmon::apple_m1(vocab.clone()).with_supported_attributes(0b0101);
    let mut session = Session::with_device(device, vocab).unwrap();

    let granted = session.negotiate(Spec::new(0b0111)).unwrap();

    assert_eq!(granted, Spec::new(0b0101));
    assert_eq!(session.spec(), Some(granted));
}

#[test]
fn test_failed_negotiation_poisons_session() {
    let mut session = m1_session();
    session.get_layout().unwrap();
    session
        .device_mut()
        .fail_next(ControlCall::Specify, libc::EINVAL);

    let err = session.negotiate(Spec::default()).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::ControlCall);
    assert_eq!(err.call(), Some(ControlCall::Specify));
    assert_eq!(err.os_code(), Some(libc::EINVAL));

    assert_eq!(session.sample().unwrap_err().kind(), &ErrorKind::Poisoned);
    assert_eq!(
        session.negotiate(Spec::default()).unwrap_err().kind(),
        &ErrorKind::Poisoned
    );
    assert_eq!(session.get_layout().unwrap_err().kind(), &ErrorKind::Poisoned);
}

#[test]
fn test_control_call_error_carries_code() {
    let mut session = m1_session();
    session.get_layout().unwrap();
    session
        .device_mut()
        .fail_next(ControlCall::SampleRegs, libc::EIO);

    let err = session.sample().unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::ControlCall);
    assert_eq!(err.call(), Some(ControlCall::SampleRegs));
    assert_eq!(err.os_code(), Some(libc::EIO));

    // Sampling failures do not poison the session.
    assert!(session.sample().is_ok());
}

#[test]
fn test_failed_discovery_leaves_layout_unknown() {
    let mut session = m1_session();
    session
        .device_mut()
        .fail_next(ControlCall::GetLayout, libc::ENODEV);

    assert_eq!(
        session.get_layout().unwrap_err().kind(),
        &ErrorKind::ControlCall
    );
    assert_eq!(session.layout(), None);
    assert_eq!(
        session.list_registers().unwrap_err().kind(),
        &ErrorKind::Precondition
    );
}

#[test]
fn test_empty_layout_rejected() {
    let vocab = ControlVocabulary::xnu();
    let device = SimulatedPerfmon::new(vocab.clone(), Vec::<String>::new(), 1);
    let mut session = Session::with_device(device, vocab).unwrap();

    let err = session.get_layout().unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::ControlCall);
    assert_eq!(err.call(), Some(ControlCall::GetLayout));
}

#[test]
fn test_slot_collision() {
    let mut session = m1_session();
    session.get_layout().unwrap();

    session
        .register_event(Event::new("first", 1, 4))
        .expect("failed to register event");

    let err = session
        .register_event(Event::new("second", 2, 4))
        .expect_err("expected slot collision");
    assert_eq!(err.kind(), &ErrorKind::SlotCollision);
    assert_eq!(session.registered_events().len(), 1);
}

#[test]
fn test_slot_collision_reported_by_device() {
    let mut session = m1_session();
    session.get_layout().unwrap();
    session
        .device_mut()
        .fail_next(ControlCall::AddEvent, libc::EBUSY);

    let err = session
        .register_event(Event::new("first", 1, 4))
        .unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::SlotCollision);
    assert_eq!(err.os_code(), Some(libc::EBUSY));
    assert!(session.registered_events().is_empty());
}

#[test]
fn test_slot_out_of_range() {
    let mut session = m1_session();
    session.get_layout().unwrap();

    let err = session
        .register_event(Event::new("late", 1, 25))
        .unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::SlotOutOfRange);

    assert!(session.register_event(Event::new("last", 1, 24)).is_ok());
}

#[test]
fn test_bad_event_name() {
    let mut session = m1_session();
    session.get_layout().unwrap();

    assert_eq!(
        session
            .register_event(Event::new("in\0valid", 1, 2))
            .unwrap_err()
            .kind(),
        &ErrorKind::InvalidEventName
    );
}

#[test]
fn test_event_affects_next_sample() {
    let mut session = m1_session();
    session.get_layout().unwrap();
    let pmc3 = session.list_registers().unwrap().index_of("PMC3").unwrap();

    let s1 = session.sample().unwrap();
    let s2 = session.sample().unwrap();
    assert_eq!(s2.delta(&s1, 0, pmc3), Some(0));

    session
        .register_event(Event::new("branches", 11, 3))
        .unwrap();

    let s3 = session.sample().unwrap();
    assert_eq!(s3.delta(&s2, 0, pmc3), Some(11));
    assert_eq!(
        session.registered_events(),
        &[Event::new("branches", 11, 3)]
    );
}

#[test]
fn test_invalid_vocabulary_rejected() {
    let mut vocab = ControlVocabulary::xnu();
    vocab.spec.attributes_offset = vocab.spec.size;

    let err = Session::with_device(SimulatedPerfmon::apple_m1(vocab.clone()), vocab)
        .expect_err("expected invalid vocabulary");
    assert_eq!(err.kind(), &ErrorKind::InvalidVocabulary);
}

#[test]
fn test_overlapping_event_fields_rejected() {
    // The event number would overwrite the start of the name.
    let mut vocab = ControlVocabulary::xnu();
    vocab.event.number_offset = vocab.event.name_offset;

    let err = Session::with_device(SimulatedPerfmon::apple_m1(vocab.clone()), vocab)
        .expect_err("expected invalid vocabulary");
    assert_eq!(err.kind(), &ErrorKind::InvalidVocabulary);
}

#[test]
fn test_custom_vocabulary() {
    // A facility with different codes, wider names and a reordered layout.
    let mut vocab = ControlVocabulary::xnu();
    vocab.get_layout = 0x1000;
    vocab.specify = 0x1001;
    vocab.list_regs = 0x1002;
    vocab.sample_regs = 0x1003;
    vocab.add_event = 0x1004;
    vocab.configure = 0x1005;
    vocab.name_width = 32;
    vocab.layout = LayoutFormat {
        size: 4,
        reg_count_offset: 0,
        unit_count_offset: 2,
    };

    let device = SimulatedPerfmon::new(vocab.clone(), vec!["CYCLES", "INSTRUCTIONS"], 2)
        .with_increment(0, 3);
    let mut session = Session::with_device(device, vocab).unwrap();

    let layout = session.get_layout().unwrap();
    assert_eq!(layout.register_count, 2);
    assert_eq!(layout.unit_count, 2);

    assert_eq!(
        session.list_registers().unwrap().iter().collect::<Vec<_>>(),
        vec!["CYCLES", "INSTRUCTIONS"]
    );

    let sample = session.sample().unwrap();
    assert_eq!(sample.as_slice(), &[3, 0, 3, 0]);
}

#[test]
fn test_native_device_unavailable() {
    let err = SessionConfig::default()
        .path("/dev/perfmon_missing")
        .open()
        .expect_err("expected missing device");

    assert_eq!(err.kind(), &ErrorKind::DeviceUnavailable);
}
