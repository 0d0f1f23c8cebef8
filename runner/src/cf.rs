//! Owned CoreFoundation objects for the launch call's arguments.
//!
//! On targets without CoreFoundation the constructors fail, which the probe
//! reports as an argument error instead of calling into the library.

use crate::error::ProbeError;
use std::ffi::c_void;

#[cfg(target_vendor = "apple")]
#[allow(non_upper_case_globals)]
mod sys {
    use std::ffi::c_void;

    pub type CFIndex = isize;
    pub const K_CF_STRING_ENCODING_UTF8: u32 = 0x0800_0100;

    #[repr(C)]
    pub struct OpaqueCallBacks {
        _private: [u8; 0],
    }

    #[link(name = "CoreFoundation", kind = "framework")]
    unsafe extern "C" {
        pub static kCFTypeDictionaryKeyCallBacks: OpaqueCallBacks;
        pub static kCFTypeDictionaryValueCallBacks: OpaqueCallBacks;

        pub fn CFStringCreateWithBytes(
            alloc: *const c_void,
            bytes: *const u8,
            num_bytes: CFIndex,
            encoding: u32,
            is_external_representation: u8,
        ) -> *const c_void;
        pub fn CFDictionaryCreate(
            alloc: *const c_void,
            keys: *const *const c_void,
            values: *const *const c_void,
            num_values: CFIndex,
            key_callbacks: *const OpaqueCallBacks,
            value_callbacks: *const OpaqueCallBacks,
        ) -> *const c_void;
        pub fn CFRelease(cf: *const c_void);
    }
}

/// A +1 retained CoreFoundation reference, released on drop.
pub struct CfOwned {
    ptr: *const c_void,
}

impl CfOwned {
    pub fn as_ptr(&self) -> *const c_void {
        self.ptr
    }
}

#[cfg(target_vendor = "apple")]
impl CfOwned {
    pub fn string(value: &str) -> Result<Self, ProbeError> {
        let len = sys::CFIndex::try_from(value.len())
            .map_err(|_| ProbeError::Argument("identifier is too long".to_string()))?;
        // SAFETY: `value` is valid for `len` bytes; a null allocator selects the default one.
        let ptr = unsafe {
            sys::CFStringCreateWithBytes(
                std::ptr::null(),
                value.as_ptr(),
                len,
                sys::K_CF_STRING_ENCODING_UTF8,
                0,
            )
        };
        Self::from_create(ptr, "CFStringCreateWithBytes")
    }

    pub fn empty_dictionary() -> Result<Self, ProbeError> {
        // SAFETY: zero entries, so the key/value arrays are never read.
        let ptr = unsafe {
            sys::CFDictionaryCreate(
                std::ptr::null(),
                std::ptr::null(),
                std::ptr::null(),
                0,
                &raw const sys::kCFTypeDictionaryKeyCallBacks,
                &raw const sys::kCFTypeDictionaryValueCallBacks,
            )
        };
        Self::from_create(ptr, "CFDictionaryCreate")
    }

    fn from_create(ptr: *const c_void, call: &str) -> Result<Self, ProbeError> {
        if ptr.is_null() {
            return Err(ProbeError::Argument(format!("{call} returned NULL")));
        }
        Ok(CfOwned { ptr })
    }
}

#[cfg(target_vendor = "apple")]
impl Drop for CfOwned {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from a Create call and is released exactly once here.
        unsafe { sys::CFRelease(self.ptr) }
    }
}

#[cfg(not(target_vendor = "apple"))]
impl CfOwned {
    pub fn string(_value: &str) -> Result<Self, ProbeError> {
        Err(unavailable())
    }

    pub fn empty_dictionary() -> Result<Self, ProbeError> {
        Err(unavailable())
    }
}

#[cfg(not(target_vendor = "apple"))]
fn unavailable() -> ProbeError {
    ProbeError::Argument("CoreFoundation is not available on this target".to_string())
}
