use std::sync::LazyLock;

pub mod syscall;

pub use perf_event_open_sys::bindings;

// Reads a `T` at the pointer and offsets it by the size of `T`.
// The read buffer is a byte vector, so the pointer may be unaligned.
#[inline]
pub unsafe fn deref_offset<T: Copy>(ptr: &mut *const u8) -> T {
    let val = (*ptr as *const T).read_unaligned();
    *ptr = ptr.add(size_of::<T>());
    val
}

pub static PAGE_SIZE: LazyLock<usize> = LazyLock::new(|| {
    let name = libc::_SC_PAGE_SIZE;
    let size = unsafe { libc::sysconf(name) };
    size as _
});

pub type Attr = bindings::perf_event_attr;
