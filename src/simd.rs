/// SIMD-accelerated slice kernels for framing and overlap-add, using pulp
///
/// Every kernel has a scalar fallback; with the `simd` feature enabled the
/// `f32` and `f64` cases dispatch to pulp-vectorized loops.
use num_traits::Float;

#[cfg(feature = "simd")]
use pulp::Arch;
#[cfg(feature = "simd")]
use std::any::TypeId;

#[cfg(feature = "simd")]
#[inline]
fn cast<T: 'static, U: 'static>(slice: &[T]) -> Option<&[U]> {
    if TypeId::of::<T>() == TypeId::of::<U>() {
        // Safety: T and U are the same type
        Some(unsafe { &*(slice as *const [T] as *const [U]) })
    } else {
        None
    }
}

#[cfg(feature = "simd")]
#[inline]
fn cast_mut<T: 'static, U: 'static>(slice: &mut [T]) -> Option<&mut [U]> {
    if TypeId::of::<T>() == TypeId::of::<U>() {
        // Safety: T and U are the same type
        Some(unsafe { &mut *(slice as *mut [T] as *mut [U]) })
    } else {
        None
    }
}

/// Generate the f32/f64 vectorized bodies for a kernel with two read-only
/// inputs, one scalar and one output.
#[cfg(feature = "simd")]
macro_rules! simd_kernel {
    ($name:ident, $ty:ty, |$a:ident, $b:ident, $s:ident, $o:ident| $body:expr) => {
        fn $name(simd: Arch, lhs: &[$ty], rhs: &[$ty], scalar: $ty, output: &mut [$ty]) {
            simd.dispatch(|| {
                let (lhs_head, lhs_tail) = pulp::as_arrays::<4, _>(lhs);
                let (rhs_head, rhs_tail) = pulp::as_arrays::<4, _>(rhs);
                let (out_head, out_tail) = pulp::as_arrays_mut::<4, _>(output);

                for ((o, l), r) in out_head.iter_mut().zip(lhs_head).zip(rhs_head) {
                    for lane in 0..4 {
                        let ($a, $b, $s) = (l[lane], r[lane], scalar);
                        let $o = &mut o[lane];
                        $body;
                    }
                }

                for ((o, &$a), &$b) in out_tail.iter_mut().zip(lhs_tail).zip(rhs_tail) {
                    let $s = scalar;
                    let $o = o;
                    $body;
                }
            });
        }
    };
}

#[cfg(feature = "simd")]
simd_kernel!(window_f32, f32, |x, w, _s, o| *o = x * w);
#[cfg(feature = "simd")]
simd_kernel!(window_f64, f64, |x, w, _s, o| *o = x * w);
#[cfg(feature = "simd")]
simd_kernel!(overlap_add_f32, f32, |x, w, s, o| *o += x * w * s);
#[cfg(feature = "simd")]
simd_kernel!(overlap_add_f64, f64, |x, w, s, o| *o += x * w * s);

/// Apply window function to frame samples (element-wise multiplication)
/// output[i] = signal[i] * window[i]
#[inline]
pub fn apply_window<T: Float + 'static>(signal: &[T], window: &[T], output: &mut [T]) {
    debug_assert_eq!(signal.len(), window.len());
    debug_assert_eq!(signal.len(), output.len());

    #[cfg(feature = "simd")]
    {
        if let (Some(s), Some(w), Some(o)) = (cast(signal), cast(window), cast_mut(output)) {
            window_f32(Arch::new(), s, w, 0.0, o);
            return;
        }
        if let (Some(s), Some(w), Some(o)) = (cast(signal), cast(window), cast_mut(output)) {
            window_f64(Arch::new(), s, w, 0.0, o);
            return;
        }
    }

    for ((o, &s), &w) in output.iter_mut().zip(signal).zip(window) {
        *o = s * w;
    }
}

/// Windowed overlap-add of one synthesized frame
/// output[i] += frame[i] * window[i] * scale
#[inline]
pub fn overlap_add<T: Float + 'static>(frame: &[T], window: &[T], scale: T, output: &mut [T]) {
    debug_assert_eq!(frame.len(), window.len());
    debug_assert_eq!(frame.len(), output.len());

    #[cfg(feature = "simd")]
    {
        if let (Some(f), Some(w), Some(s), Some(o)) = (
            cast::<T, f32>(frame),
            cast(window),
            cast::<T, f32>(std::slice::from_ref(&scale)),
            cast_mut(output),
        ) {
            overlap_add_f32(Arch::new(), f, w, s[0], o);
            return;
        }
        if let (Some(f), Some(w), Some(s), Some(o)) = (
            cast::<T, f64>(frame),
            cast(window),
            cast::<T, f64>(std::slice::from_ref(&scale)),
            cast_mut(output),
        ) {
            overlap_add_f64(Arch::new(), f, w, s[0], o);
            return;
        }
    }

    for ((o, &x), &w) in output.iter_mut().zip(frame).zip(window) {
        *o = *o + x * w * scale;
    }
}

/// Accumulate squared window values into the synthesis envelope
/// output[i] += window[i] * window[i]
#[inline]
pub fn accumulate_squared<T: Float>(window: &[T], output: &mut [T]) {
    debug_assert_eq!(window.len(), output.len());

    for (o, &w) in output.iter_mut().zip(window) {
        *o = *o + w * w;
    }
}

/// Divide by the synthesis envelope in place.
/// Values where the envelope is below `threshold` are set to zero
#[inline]
pub fn divide_with_threshold<T: Float>(values: &mut [T], envelope: &[T], threshold: T) {
    debug_assert_eq!(values.len(), envelope.len());

    // Scalar: the branch defeats vectorization anyway
    for (v, &e) in values.iter_mut().zip(envelope) {
        *v = if e > threshold { *v / e } else { T::zero() };
    }
}
