use perfmon::affinity::{self, CoreKind};
use perfmon::hardware::Native;
use perfmon::*;

fn main() {
    // Counters are per core: keep the sampling thread on the P cores.
    if let Err(e) = affinity::prefer_core(CoreKind::Performance) {
        eprintln!("cannot select core kind: {}", e);
    }

    // Override the node with PERFMON_CORE_DEVICE, or use
    // DeviceVariant::Uncore for the cluster-wide counters.
    let mut session = SessionConfig::default()
        .variant(DeviceVariant::Core)
        .open()
        .expect("failed to open perfmon device");

    let layout = session.get_layout().expect("failed to get layout");
    println!(
        "{} registers on {} units",
        layout.register_count, layout.unit_count
    );

    let spec = session
        .negotiate(Spec::default())
        .expect("failed to negotiate spec");
    println!("attributes: {:#x}", spec.attributes);

    let catalog = session.list_registers().expect("failed to list registers");
    let names: Vec<&str> = catalog.iter().collect();
    println!("{}", names.join(", "));
    let pmc0 = catalog.index_of("PMC0").expect("no cycle counter");

    // Time a loop with the fixed cycle counter.
    let before = session.sample().expect("failed to sample");
    let mut x = 0u64;
    for i in 0..100 {
        x = x.wrapping_add(i + 1);
    }
    let after = session.sample().expect("failed to sample");

    println!(
        "loop ({}) took {} cycles on core {}",
        x,
        after.delta(&before, 0, pmc0).unwrap_or(0),
        current_core(&Native)
    );

    // Sign a pointer, then authenticate it with the right and a wrong salt.
    let addr = main as fn() as usize as u64 & !pac::PAC_BITMASK;
    let signed = pac::sign(&Native, addr, 0x1337);
    println!("{:#x} signed: {}", addr, signed);
    println!("good salt: {:#x}", pac::authenticate(&Native, signed, 0x1337));
    println!("bad salt:  {:#x}", pac::authenticate(&Native, signed, 0x1338));

    session.close().expect("failed to close session");
}
