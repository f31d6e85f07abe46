use super::native::{NativeEvent, NativeTable};
use super::preset::{self, PresetMap};
use super::*;
use crate::error::ErrorKind;
use crate::topology::ComponentId;

fn table() -> NativeTable {
    let mut table = NativeTable::new(ComponentId::CPU);
    table.push(NativeEvent::new("CYCLES", "Core cycles").categories(Categories {
        misc: true,
        ..Default::default()
    }));
    table.push(NativeEvent::new("INSTRUCTIONS", "Retired instructions").categories(
        Categories {
            instruction: true,
            ..Default::default()
        },
    ));
    let mut l1d = NativeEvent::new("L1D_MISS", "L1 data misses").categories(Categories {
        cache: true,
        l1: true,
        ..Default::default()
    });
    l1d.available = false;
    table.push(l1d);
    table.push(NativeEvent::new("L1I_MISS", "L1 instruction misses").categories(
        Categories {
            cache: true,
            l1: true,
            ..Default::default()
        },
    ));
    table
}

#[test]
fn test_event_code_bits() {
    assert!(preset::TOT_INS.is_preset());
    assert!(!preset::TOT_INS.is_native());
    assert_eq!(preset::TOT_INS.code(), 0x8000_0032);
    assert_eq!(preset::L1_DCM.code(), 0x8000_0000);

    let native = Event::native(ComponentId(3), 7);
    assert!(native.is_native());
    assert!(!native.is_preset());
    assert_eq!(native.code(), 0x4000_0000 | 3 << 26 | 7);
    assert_eq!(native.component(), ComponentId(3));
    assert_eq!(native.index(), 7);
    assert_eq!(preset::TOT_CYC.component(), ComponentId::CPU);

    assert_eq!(Event::from_code(native.code()), native);
    assert_eq!(u32::from(native), native.code());
}

#[test]
fn test_event_format() {
    assert_eq!(format!("{:?}", preset::TOT_CYC), "Event(PAPI_TOT_CYC)");
    assert_eq!(format!("{}", preset::TOT_CYC), "0x8000003b");
    assert_eq!(
        format!("{:?}", Event::native(ComponentId::CPU, 1)),
        "Event(0x40000001)"
    );
}

#[test]
fn test_event_mask() {
    assert_eq!(EventMask::PRESET.bits(), 0x8000_0000);
    assert_eq!(EventMask::NATIVE.bits(), 0x4000_0000);
    assert_eq!(EventMask::component(ComponentId(2)).bits(), 0x4800_0000);
    assert_eq!(EventMask::component(ComponentId::CPU), EventMask::NATIVE);
}

#[test]
fn test_preset_table_is_ordered() {
    let all = preset::all();
    assert_eq!(all.len(), 108);
    for (i, it) in all.iter().enumerate() {
        assert_eq!(it.event.index() as usize, i, "{}", it.symbol);
        assert!(it.symbol.starts_with("PAPI_"));
        assert!(!it.categories().is_empty());
        assert_eq!(preset::lookup(it.event).map(|p| p.symbol), Some(it.symbol));
    }
    assert!(preset::lookup(Event::from_code(0x8000_0000 | 108)).is_none());
    assert!(preset::lookup(Event::native(ComponentId::CPU, 0)).is_none());
}

#[test]
fn test_preset_by_symbol() {
    assert_eq!(preset::by_symbol("PAPI_TOT_INS").map(|preset| preset.event), Some(preset::TOT_INS));
    assert_eq!(preset::by_symbol("FP_OPS").map(|preset| preset.event), Some(preset::FP_OPS));
    assert!(preset::by_symbol("PAPI_NOT_A_PRESET").is_none());
    assert!(preset::by_symbol("").is_none());
}

#[test]
fn test_categories_bits() {
    let cats = Categories {
        cache: true,
        l2: true,
        ..Default::default()
    };
    assert_eq!(cats.bits(), 0x4000 | 0x10000);
    assert_eq!(Categories::from_bits(cats.bits()), cats);
    assert!(cats.intersects(&Categories {
        l2: true,
        ..Default::default()
    }));
    assert!(!cats.intersects(&Categories {
        tlb: true,
        ..Default::default()
    }));
}

#[test]
fn test_modifier_bits() {
    assert_eq!(EventModifier::from_bits(0), EventModifier::All);
    assert_eq!(EventModifier::from_bits(1), EventModifier::First);
    assert_eq!(EventModifier::from_bits(2), EventModifier::Available);
    let cats = Categories {
        floating_point: true,
        ..Default::default()
    };
    assert_eq!(
        EventModifier::from_bits(cats.bits()),
        EventModifier::Categories(cats)
    );
    assert_eq!(EventModifier::Categories(cats).bits(), 0x80000);

    // Nothing tells an empty filter from `All` on the wire.
    let empty = EventModifier::Categories(Categories::default());
    assert_eq!(EventModifier::from_bits(empty.bits()), EventModifier::All);
}

#[test]
fn test_postfix_parse_and_evaluate() {
    let expr: Postfix = "N0|N1|2|*|+|".parse().unwrap();
    assert_eq!(expr.evaluate(&[3, 4]), 11);
    assert_eq!(expr.to_string(), "N0|N1|2|*|+|");

    let expr: Postfix = "N0|N1|-|N2|/".parse().unwrap();
    assert_eq!(expr.evaluate(&[10, 4, 3]), 2);
    assert_eq!(expr.evaluate(&[10, 4, 0]), 0);

    assert!("N0|+|".parse::<Postfix>().is_err());
    assert!("N0|N1|".parse::<Postfix>().is_err());
    assert!("N0|X|+|".parse::<Postfix>().is_err());
    assert!("".parse::<Postfix>().is_err());
}

#[test]
fn test_derivation_evaluate() {
    assert_eq!(Derivation::NotDerived.evaluate(&[5]), 5);
    assert_eq!(Derivation::Add.evaluate(&[5, 6, 7]), 18);
    assert_eq!(Derivation::Sub.evaluate(&[10, 3, 2]), 5);
    assert_eq!(Derivation::Add.as_str(), "DERIVED_ADD");
    assert!(Derivation::NotDerived.check(2).is_err());
    assert!(Derivation::Add.check(1).is_err());
    let expr: Postfix = "N0|N2|+|".parse().unwrap();
    assert!(Derivation::Postfix(expr.clone()).check(2).is_err());
    assert!(Derivation::Postfix(expr).check(3).is_ok());
}

#[test]
fn test_native_table_enumerate() {
    let table = table();
    let mut code = Event::native(ComponentId::CPU, 0);

    table.enumerate(&mut code, EventModifier::First).unwrap();
    assert_eq!(code.index(), 0);

    let mut seen = vec![];
    while table.enumerate(&mut code, EventModifier::All).is_ok() {
        seen.push(code.index());
    }
    assert_eq!(seen, [1, 2, 3]);

    let mut code = Event::native(ComponentId::CPU, 0);
    let mut seen = vec![];
    while table.enumerate(&mut code, EventModifier::Available).is_ok() {
        seen.push(code.index());
    }
    assert_eq!(seen, [1, 3]);

    let l1 = EventModifier::Categories(Categories {
        l1: true,
        ..Default::default()
    });
    let mut code = Event::native(ComponentId::CPU, 0);
    table.enumerate(&mut code, l1).unwrap();
    assert_eq!(code.index(), 2);
    table.enumerate(&mut code, l1).unwrap();
    assert_eq!(code.index(), 3);
    let err = table.enumerate(&mut code, l1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoMoreEvents);
}

#[test]
fn test_native_table_lookup() {
    let table = table();
    let event = table.lookup("L1I_MISS").unwrap();
    assert_eq!(table.get(event).unwrap().name, "L1I_MISS");
    assert!(table.lookup("NOPE").is_none());

    let foreign = Event::native(ComponentId(1), 0);
    assert_eq!(table.get(foreign).unwrap_err().kind(), ErrorKind::InvalidEvent);
    assert_eq!(
        table.get(Event::native(ComponentId::CPU, 99)).unwrap_err().kind(),
        ErrorKind::InvalidEvent
    );
}

#[test]
fn test_preset_map() {
    let table = table();
    let mut map = PresetMap::new();
    map.define(preset::TOT_CYC, &["CYCLES"], Derivation::NotDerived, &table)
        .unwrap();
    map.define(
        preset::L1_TCM,
        &["L1D_MISS", "L1I_MISS"],
        Derivation::Add,
        &table,
    )
    .unwrap();
    map.annotate(preset::L1_TCM, "sum of data and instruction misses");

    assert_eq!(map.len(), 2);
    assert!(map.available(preset::TOT_CYC, &table).is_some());
    // L1D_MISS did not probe as countable.
    assert!(map.get(preset::L1_TCM).is_some());
    assert!(map.available(preset::L1_TCM, &table).is_none());
    assert_eq!(
        map.get(preset::L1_TCM).and_then(|def| def.note.as_deref()),
        Some("sum of data and instruction misses")
    );

    let err = map
        .define(preset::TOT_INS, &["MISSING"], Derivation::NotDerived, &table)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEvent);
    let err = map
        .define(preset::TOT_INS, &["INSTRUCTIONS", "CYCLES"], Derivation::NotDerived, &table)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = map
        .define(table.lookup("CYCLES").unwrap(), &["CYCLES"], Derivation::NotDerived, &table)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEvent);
}

#[test]
fn test_event_info_from_preset() {
    let table = table();
    let mut map = PresetMap::new();
    let expr: Postfix = "N0|N1|2|*|+|".parse().unwrap();
    map.define(
        preset::FP_OPS,
        &["CYCLES", "INSTRUCTIONS"],
        Derivation::Postfix(expr),
        &table,
    )
    .unwrap();

    let preset = preset::lookup(preset::FP_OPS).unwrap();
    let name = |e: Event| table.get(e).map(|native| native.name.clone()).unwrap_or_default();
    let info = EventInfo::from_preset(preset, map.get(preset::FP_OPS), name);
    assert_eq!(info.symbol, "PAPI_FP_OPS");
    assert_eq!(info.derived, "DERIVED_POSTFIX");
    assert_eq!(info.postfix, "N0|N1|2|*|+|");
    assert_eq!(info.name, ["CYCLES", "INSTRUCTIONS"]);
    assert_eq!(info.count(), 2);

    let info = EventInfo::from_preset(preset::lookup(preset::TOT_INS).unwrap(), None, name);
    assert_eq!(info.derived, "NOT_DERIVED");
    assert_eq!(info.count(), 0);
}
