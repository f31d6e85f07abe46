use std::path::PathBuf;

/// Memory usage of the calling process, see [`Library::dmem_info`][crate::Library::dmem_info].
///
/// All sizes are in kB except `pagesize`. Zero is a legal reading for every field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DynMemInfo {
    pub peak: u64,
    pub size: u64,
    pub resident: u64,
    pub high_water_mark: u64,
    pub shared: u64,
    pub text: u64,
    pub library: u64,
    pub heap: u64,
    pub locked: u64,
    pub stack: u64,
    /// Page size in bytes.
    pub pagesize: u64,
    /// Size of page table entries.
    pub pte: u64,
}

/// Address ranges of the program image.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AddressMap {
    pub name: String,
    pub text_start: usize,
    pub text_end: usize,
    pub data_start: usize,
    pub data_end: usize,
    pub bss_start: usize,
    pub bss_end: usize,
}

/// The running executable, see [`Library::executable_info`][crate::Library::executable_info].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExecutableInfo {
    pub full_name: PathBuf,
    pub address_info: AddressMap,
}
