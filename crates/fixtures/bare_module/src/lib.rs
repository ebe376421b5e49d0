// crates/fixtures/bare_module/src/lib.rs
//
// A loadable module that exports neither `loadPlugin` nor `unloadPlugin`.

#[no_mangle]
pub extern "C" fn bare_module_answer() -> u32 {
    42
}
