//! Coordinate arithmetic, distance, and random sampling shared by strategies.

use at_types::{internal_error, Coordinate, SearchSpace, TuneError, TuneResult};
use rand::Rng;

fn zip_with(
    a: &Coordinate,
    b: &Coordinate,
    op: impl Fn(i64, i64) -> Option<i64>,
) -> TuneResult<Coordinate> {
    if a.dims() != b.dims() {
        return Err(internal_error!(
            "coordinate dimensions differ: {a} has {}, {b} has {}",
            a.dims(),
            b.dims()
        ));
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            op(*x, *y).ok_or_else(|| internal_error!("coordinate overflow combining {a} and {b}"))
        })
        .collect::<TuneResult<Vec<_>>>()
        .map(Coordinate::new)
}

/// `a + b`, component-wise.
pub fn add(a: &Coordinate, b: &Coordinate) -> TuneResult<Coordinate> {
    zip_with(a, b, i64::checked_add)
}

/// `a - b`, component-wise.
pub fn sub(a: &Coordinate, b: &Coordinate) -> TuneResult<Coordinate> {
    zip_with(a, b, i64::checked_sub)
}

/// `coef * c`, each component rounded half-up to the nearest integer.
pub fn scale(coef: f64, c: &Coordinate) -> Coordinate {
    Coordinate::new(c.iter().map(|x| round_half_up(coef * *x as f64)).collect())
}

fn round_half_up(v: f64) -> i64 {
    (v + 0.5).floor() as i64
}

/// Euclidean distance between two coordinates of equal dimensionality.
pub fn distance(a: &Coordinate, b: &Coordinate) -> TuneResult<f64> {
    if a.dims() != b.dims() {
        return Err(internal_error!(
            "coordinate dimensions differ: {a} has {}, {b} has {}",
            a.dims(),
            b.dims()
        ));
    }
    Ok(a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*y as f64 - *x as f64).powi(2))
        .sum::<f64>()
        .sqrt())
}

/// Uniform random integer in `[low, high]`.
pub fn random_int<R: Rng + ?Sized>(rng: &mut R, low: i64, high: i64) -> TuneResult<i64> {
    if low > high {
        return Err(TuneError::invalid_range(low, high));
    }
    Ok(rng.gen_range(low..=high))
}

/// Uniform random real in `[low, high)`; `low` itself when the range is empty.
///
/// Both bounds and their span must be finite.
pub fn random_real<R: Rng + ?Sized>(rng: &mut R, low: f64, high: f64) -> TuneResult<f64> {
    if !low.is_finite() || !high.is_finite() || low > high || !(high - low).is_finite() {
        return Err(TuneError::invalid_range(low, high));
    }
    if low == high {
        return Ok(low);
    }
    Ok(rng.gen_range(low..high))
}

/// Coordinate drawn independently per axis within its bounds.
pub fn random_coordinate<R: Rng + ?Sized>(
    rng: &mut R,
    space: &SearchSpace,
) -> TuneResult<Coordinate> {
    (0..space.dims())
        .map(|axis| random_int(rng, 0, space.cardinality(axis) as i64 - 1))
        .collect::<TuneResult<Vec<_>>>()
        .map(Coordinate::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use at_types::ParamValue;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn c(v: &[i64]) -> Coordinate {
        Coordinate::new(v.to_vec())
    }

    #[test]
    fn add_and_sub_are_component_wise() {
        assert_eq!(add(&c(&[1, 2]), &c(&[3, -1])).unwrap(), c(&[4, 1]));
        assert_eq!(sub(&c(&[1, 2]), &c(&[3, -1])).unwrap(), c(&[-2, 3]));
        assert!(add(&c(&[1]), &c(&[1, 2])).is_err());
    }

    #[test]
    fn overflowing_components_are_errors() {
        assert!(matches!(
            add(&c(&[i64::MAX, 0]), &c(&[1, 0])),
            Err(TuneError::Internal(_))
        ));
        assert!(matches!(
            sub(&c(&[i64::MIN]), &c(&[1])),
            Err(TuneError::Internal(_))
        ));
        assert_eq!(
            distance(&c(&[i64::MIN]), &c(&[i64::MAX])).unwrap(),
            2f64.powi(64)
        );
    }

    #[test]
    fn scale_rounds_half_up() {
        assert_eq!(scale(0.5, &c(&[1, 3, 4])), c(&[1, 2, 2]));
        assert_eq!(scale(1.5, &c(&[-1])), c(&[-1]));
        assert_eq!(scale(0.3, &c(&[10])), c(&[3]));
    }

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(distance(&c(&[0, 0]), &c(&[3, 4])).unwrap(), 5.0);
        assert_eq!(distance(&c(&[2, 1]), &c(&[2, 1])).unwrap(), 0.0);
    }

    #[test]
    fn inverted_bounds_are_fatal() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert!(matches!(
            random_int(&mut rng, 5, 2),
            Err(TuneError::InvalidRange { .. })
        ));
        assert!(matches!(
            random_real(&mut rng, 5.0, 2.0),
            Err(TuneError::InvalidRange { .. })
        ));
    }

    #[test]
    fn non_finite_real_bounds_are_fatal() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for (low, high) in [
            (0.0, f64::INFINITY),
            (f64::NEG_INFINITY, 0.0),
            (f64::NAN, 1.0),
            (-f64::MAX, f64::MAX),
        ] {
            assert!(
                matches!(
                    random_real(&mut rng, low, high),
                    Err(TuneError::InvalidRange { .. })
                ),
                "[{low}, {high})"
            );
        }
    }

    #[test]
    fn random_values_stay_in_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..200 {
            let i = random_int(&mut rng, -2, 3).unwrap();
            assert!((-2..=3).contains(&i));
            let r = random_real(&mut rng, 0.5, 1.0).unwrap();
            assert!((0.5..1.0).contains(&r));
        }
        assert_eq!(random_int(&mut rng, 4, 4).unwrap(), 4);
        assert_eq!(random_real(&mut rng, 2.0, 2.0).unwrap(), 2.0);
    }

    #[test]
    fn random_coordinate_is_in_range() {
        let space = SearchSpace::new()
            .add_axis("A", vec![ParamValue::Int(1), ParamValue::Int(2)])
            .add_axis("B", (0..5).map(ParamValue::Int).collect());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..100 {
            let coord = random_coordinate(&mut rng, &space).unwrap();
            assert!(space.is_in_range(&coord));
        }
    }
}
