#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    formula_sql::fuzz_helper::aggregate_everywhere(data);
});
