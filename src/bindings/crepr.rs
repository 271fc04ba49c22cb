// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Values that can be copied to the GPU byte for byte.
*/

/**
Marker for types whose in-memory representation can be handed to a shader.

# Safety

Implementors must guarantee:
* the type has a stable layout (`#[repr(C)]` or `#[repr(transparent)]`, or a primitive)
* the type has no padding bytes, since values are compared byte for byte and
  uninitialized padding cannot be read
* the type holds no pointers or references
* the layout matches what the shader declares

None of this is checked.
*/
pub unsafe trait CRepr: Copy + 'static {}

unsafe impl CRepr for u8 {}
unsafe impl CRepr for u16 {}
unsafe impl CRepr for u32 {}
unsafe impl CRepr for u64 {}
unsafe impl CRepr for i8 {}
unsafe impl CRepr for i16 {}
unsafe impl CRepr for i32 {}
unsafe impl CRepr for i64 {}
unsafe impl CRepr for f32 {}
unsafe impl CRepr for f64 {}
unsafe impl<T: CRepr, const N: usize> CRepr for [T; N] {}

/// Views a value as its bytes.
pub fn bytes_of<T: CRepr>(value: &T) -> &[u8] {
    // Safety: CRepr guarantees every byte of T is initialized
    unsafe { std::slice::from_raw_parts(value as *const T as *const u8, std::mem::size_of::<T>()) }
}
