//! FFI bindings for FlexRAN SDK
//! 
//! This module provides low-level FFI bindings to the FlexRAN SDK
//! for accelerated 5G PHY processing.

use libc::{c_float, c_int, c_uint, c_void, size_t};
use num_complex::Complex32;
use std::os::raw::c_char;

/// Complex number representation for C interop
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct FftComplex {
    pub re: c_float,
    pub im: c_float,
}

impl From<Complex32> for FftComplex {
    fn from(c: Complex32) -> Self {
        FftComplex { re: c.re, im: c.im }
    }
}

impl From<FftComplex> for Complex32 {
    fn from(c: FftComplex) -> Self {
        Complex32::new(c.re, c.im)
    }
}

/// FFT configuration structure
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct FlexranFftConfig {
    pub fft_size: c_uint,
    pub num_threads: c_uint,
    pub flags: c_uint,
}

/// OFDM configuration structure
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct FlexranOfdmConfig {
    pub fft_size: c_uint,
    pub cp_len: c_uint,
    pub subcarrier_spacing: c_uint,
    pub num_symbols: c_uint,
}

/// PHY cell configuration
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct FlexranPhyConfig {
    pub cell_id: c_uint,
    pub num_prb: c_uint,
    pub numerology: c_uint,
    pub duplex_mode: c_uint,
}

/// Error codes
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FlexranError {
    Success = 0,
    InvalidParameter = -1,
    AllocationFailed = -2,
    NotInitialized = -3,
    ProcessingFailed = -4,
}

// Conditional compilation based on FlexRAN availability
#[cfg(flexran_available)]
extern "C" {
    // Memory management
    pub fn flexran_aligned_alloc(alignment: size_t, size: size_t) -> *mut c_void;
    pub fn flexran_aligned_free(ptr: *mut c_void);
    
    // OFDM functions
    pub fn flexran_ofdm_ifft(
        freq_domain: *const FftComplex,
        time_domain: *mut FftComplex,
        fft_size: c_uint,
        cp_len: c_uint,
        scaling_factor: c_float,
    ) -> c_int;
    
    pub fn flexran_ofdm_fft(
        time_domain: *const FftComplex,
        freq_domain: *mut FftComplex,
        fft_size: c_uint,
        cp_offset: c_uint,
    ) -> c_int;
    
    // Advanced OFDM functions (placeholders for actual FlexRAN API)
    pub fn flexran_ofdm_modulator_init(
        config: *const FlexranOfdmConfig,
        handle: *mut *mut c_void,
    ) -> c_int;
    
    pub fn flexran_ofdm_modulator_process(
        handle: *mut c_void,
        freq_grid: *const FftComplex,
        time_samples: *mut FftComplex,
        num_symbols: c_uint,
    ) -> c_int;
    
    pub fn flexran_ofdm_modulator_destroy(handle: *mut c_void) -> c_int;
    
    // Channel estimation
    pub fn flexran_channel_estimate(
        rx_samples: *const FftComplex,
        ref_symbols: *const FftComplex,
        channel_est: *mut FftComplex,
        num_samples: c_uint,
        num_ref: c_uint,
    ) -> c_int;
    
    // LDPC encoding/decoding (placeholders)
    pub fn flexran_ldpc_encode(
        input: *const u8,
        output: *mut u8,
        input_len: c_uint,
        base_graph: c_uint,
        lifting_size: c_uint,
    ) -> c_int;
    
    pub fn flexran_ldpc_decode(
        llr_input: *const c_float,
        output: *mut u8,
        num_bits: c_uint,
        base_graph: c_uint,
        lifting_size: c_uint,
        max_iterations: c_uint,
    ) -> c_int;
}

// Mock implementation when FlexRAN is not available
#[cfg(flexran_mock)]
extern "C" {
    // Memory management
    pub fn flexran_aligned_alloc(alignment: size_t, size: size_t) -> *mut c_void;
    pub fn flexran_aligned_free(ptr: *mut c_void);
}

// Mock implementations for OFDM functions when FlexRAN is not available
#[cfg(flexran_mock)]
pub unsafe extern "C" fn flexran_ofdm_ifft(
    _freq_domain: *const FftComplex,
    _time_domain: *mut FftComplex,
    _fft_size: c_uint,
    _cp_len: c_uint,
    _scaling_factor: c_float,
) -> c_int {
    // Return error to indicate FlexRAN is not available
    -1
}

#[cfg(flexran_mock)]
pub unsafe extern "C" fn flexran_ofdm_fft(
    _time_domain: *const FftComplex,
    _freq_domain: *mut FftComplex,
    _fft_size: c_uint,
    _cp_offset: c_uint,
) -> c_int {
    // Return error to indicate FlexRAN is not available
    -1
}

#[cfg(flexran_mock)]
pub unsafe extern "C" fn flexran_ofdm_modulator_init(
    _config: *const FlexranOfdmConfig,
    _handle: *mut *mut c_void,
) -> c_int {
    -1
}

#[cfg(flexran_mock)]
pub unsafe extern "C" fn flexran_ofdm_modulator_process(
    _handle: *mut c_void,
    _freq_grid: *const FftComplex,
    _time_samples: *mut FftComplex,
    _num_symbols: c_uint,
) -> c_int {
    -1
}

#[cfg(flexran_mock)]
pub unsafe extern "C" fn flexran_ofdm_modulator_destroy(_handle: *mut c_void) -> c_int {
    0
}

#[cfg(flexran_mock)]
pub unsafe extern "C" fn flexran_channel_estimate(
    _rx_samples: *const FftComplex,
    _ref_symbols: *const FftComplex,
    _channel_est: *mut FftComplex,
    _num_samples: c_uint,
    _num_ref: c_uint,
) -> c_int {
    -1
}

#[cfg(flexran_mock)]
pub unsafe extern "C" fn flexran_ldpc_encode(
    _input: *const u8,
    _output: *mut u8,
    _input_len: c_uint,
    _base_graph: c_uint,
    _lifting_size: c_uint,
) -> c_int {
    -1
}

#[cfg(flexran_mock)]
pub unsafe extern "C" fn flexran_ldpc_decode(
    _llr_input: *const c_float,
    _output: *mut u8,
    _num_bits: c_uint,
    _base_graph: c_uint,
    _lifting_size: c_uint,
    _max_iterations: c_uint,
) -> c_int {
    -1
}

/// Alignment requirement for AVX512 operations
pub const FLEXRAN_ALIGNMENT: usize = 64;

/// Safe wrapper for aligned memory allocation
pub fn aligned_alloc(size: usize) -> Result<*mut c_void, FlexranError> {
    let ptr = unsafe { flexran_aligned_alloc(FLEXRAN_ALIGNMENT, size) };
    if ptr.is_null() {
        Err(FlexranError::AllocationFailed)
    } else {
        Ok(ptr)
    }
}

/// Safe wrapper for aligned memory deallocation
pub fn aligned_free(ptr: *mut c_void) {
    if !ptr.is_null() {
        unsafe { flexran_aligned_free(ptr) };
    }
}

/// Aligned vector type for FlexRAN operations
pub struct AlignedVector<T> {
    ptr: *mut T,
    len: usize,
    capacity: usize,
}

impl<T> AlignedVector<T> {
    /// Create a new aligned vector with given capacity
    pub fn with_capacity(capacity: usize) -> Result<Self, FlexranError> {
        let size = capacity * std::mem::size_of::<T>();
        let ptr = aligned_alloc(size)? as *mut T;
        
        Ok(AlignedVector {
            ptr,
            len: 0,
            capacity,
        })
    }
    
    /// Create from existing data
    pub fn from_slice(data: &[T]) -> Result<Self, FlexranError>
    where
        T: Copy,
    {
        let mut vec = Self::with_capacity(data.len())?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), vec.ptr, data.len());
            vec.len = data.len();
        }
        Ok(vec)
    }
    
    /// Get pointer to data
    pub fn as_ptr(&self) -> *const T {
        self.ptr
    }
    
    /// Get mutable pointer to data
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr
    }
    
    /// Get slice view
    pub fn as_slice(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }
    
    /// Get mutable slice view
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }
    
    /// Get length
    pub fn len(&self) -> usize {
        self.len
    }
    
    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    
    /// Resize vector
    pub fn resize(&mut self, new_len: usize, value: T) 
    where
        T: Copy,
    {
        if new_len <= self.capacity {
            if new_len > self.len {
                // Fill new elements
                unsafe {
                    for i in self.len..new_len {
                        *self.ptr.add(i) = value;
                    }
                }
            }
            self.len = new_len;
        }
    }
}

impl<T> Drop for AlignedVector<T> {
    fn drop(&mut self) {
        aligned_free(self.ptr as *mut c_void);
    }
}

// Safety: AlignedVector owns its memory and ensures proper alignment
unsafe impl<T: Send> Send for AlignedVector<T> {}
unsafe impl<T: Sync> Sync for AlignedVector<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_aligned_allocation() {
        let size = 1024 * std::mem::size_of::<Complex32>();
        let ptr = aligned_alloc(size).unwrap();
        assert!(!ptr.is_null());
        assert_eq!(ptr as usize % FLEXRAN_ALIGNMENT, 0);
        aligned_free(ptr);
    }
    
    #[test]
    fn test_aligned_vector() {
        let vec = AlignedVector::<Complex32>::with_capacity(1024).unwrap();
        assert_eq!(vec.len(), 0);
        assert_eq!(vec.as_ptr() as usize % FLEXRAN_ALIGNMENT, 0);
    }
}