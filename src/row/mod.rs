// Helpers for reading and writing row values laid out in arena memory.
//
// Rows are addressed by raw pointers into an arena. Nothing here checks
// bounds or lifetimes: callers must know the layout they are reading and
// must keep the owning arena alive.

/// Pointer to the start of a row (or any value) inside an arena.
pub type RowPtr = *const u8;

pub const fn round_up_offset(off: usize, alignment: usize) -> usize {
    (off + (alignment - 1)) & !(alignment - 1)
}

/// Bytes needed for the missing-value bitmap of an array of `len` elements.
pub const fn n_missing_bytes(len: usize) -> usize {
    (len + 7) >> 3
}

macro_rules! load_store {
    ($load:ident, $store:ident, $t:ty) => {
        /// # Safety
        /// `off` must point to a readable, suitably aligned value.
        #[inline]
        pub unsafe fn $load(off: *const u8) -> $t {
            off.cast::<$t>().read()
        }

        /// # Safety
        /// `off` must point to writable memory suitably aligned for the value.
        #[inline]
        pub unsafe fn $store(off: *mut u8, v: $t) {
            off.cast::<$t>().write(v)
        }
    };
}

load_store!(load_byte, store_byte, u8);
load_store!(load_int, store_int, i32);
load_store!(load_long, store_long, i64);
load_store!(load_float, store_float, f32);
load_store!(load_double, store_double, f64);

/// # Safety
/// `off` must be readable.
#[inline]
pub unsafe fn load_bool(off: *const u8) -> bool {
    off.read() != 0
}

/// # Safety
/// `off` must be writable.
#[inline]
pub unsafe fn store_bool(off: *mut u8, b: bool) {
    off.write(b as u8)
}

/// # Safety
/// `off` must point to a readable, 4-byte aligned length.
#[inline]
pub unsafe fn load_length(off: *const u8) -> usize {
    load_int(off) as usize
}

/// # Safety
/// `off` must point to writable memory aligned for an i32.
#[inline]
pub unsafe fn store_length(off: *mut u8, len: usize) {
    store_int(off, len as i32)
}

/// # Safety
/// `off` must point to a readable, pointer-aligned address slot.
#[inline]
pub unsafe fn load_address(off: *const u8) -> *const u8 {
    off.cast::<*const u8>().read()
}

/// # Safety
/// `off` must point to a writable, pointer-aligned address slot.
#[inline]
pub unsafe fn store_address(off: *mut u8, addr: *const u8) {
    off.cast::<*const u8>().write(addr)
}

/// # Safety
/// The byte holding `bit` must be readable.
#[inline]
pub unsafe fn load_bit(bytes: *const u8, bit: usize) -> bool {
    bytes.add(bit >> 3).read() & (1 << (bit & 0x7)) != 0
}

/// # Safety
/// The byte holding `bit` must be writable.
#[inline]
pub unsafe fn set_bit(bytes: *mut u8, bit: usize) {
    *bytes.add(bit >> 3) |= 1 << (bit & 0x7);
}

/// # Safety
/// The byte holding `bit` must be writable.
#[inline]
pub unsafe fn clear_bit(bytes: *mut u8, bit: usize) {
    *bytes.add(bit >> 3) &= !(1 << (bit & 0x7));
}

/// # Safety
/// The byte holding `bit` must be writable.
#[inline]
pub unsafe fn store_bit(bytes: *mut u8, bit: usize, b: bool) {
    if b {
        set_bit(bytes, bit)
    } else {
        clear_bit(bytes, bit)
    }
}
