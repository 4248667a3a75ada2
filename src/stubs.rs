pub unsafe fn pacia(_addr: u64, _salt: u64) -> u64 {
    unimplemented!("only implemented on aarch64")
}

pub unsafe fn autia(_addr: u64, _salt: u64) -> u64 {
    unimplemented!("only implemented on aarch64")
}

pub unsafe fn read_tpidrro_el0() -> u64 {
    unimplemented!("only implemented on aarch64")
}

pub unsafe fn read_pmcr0() -> u64 {
    unimplemented!("only implemented on aarch64")
}

pub unsafe fn read_pmcr1() -> u64 {
    unimplemented!("only implemented on aarch64")
}

pub unsafe fn read_pmc0() -> u64 {
    unimplemented!("only implemented on aarch64")
}

pub unsafe fn read_pmc1() -> u64 {
    unimplemented!("only implemented on aarch64")
}
