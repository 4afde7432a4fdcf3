use rstar::AABB;

/// Clamps `num` into `[min, max]`; unlike `f64::clamp` never panics on `min > max`.
pub fn clamp<T: PartialOrd>(num: T, min: T, max: T) -> T {
    if num <= min {
        min
    } else if num >= max {
        max
    } else {
        num
    }
}

/// Number of set bits.
pub fn population(mut val: u32) -> u32 {
    let mut bits = 0;
    while val > 0 {
        bits += val & 1;
        val >>= 1;
    }
    bits
}

/// Truncates `number` to `digits` decimal places.
pub fn digits(number: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (number * factor).floor() / factor
}

pub fn bounds_from_points<P, T>(points: impl Iterator<Item = P>) -> Option<([T; 2], [T; 2])>
where
    P: Into<[T; 2]>,
    T: PartialOrd + Copy,
{
    let mut min: Option<[T; 2]> = None;
    let mut max: Option<[T; 2]> = None;

    for point in points {
        let [x, y] = point.into();

        if let Some([min_x, min_y]) = &mut min {
            if x < *min_x {
                *min_x = x;
            }
            if y < *min_y {
                *min_y = y;
            }
        } else {
            min = Some([x, y]);
        }

        if let Some([max_x, max_y]) = &mut max {
            if x > *max_x {
                *max_x = x;
            }
            if y > *max_y {
                *max_y = y;
            }
        } else {
            max = Some([x, y]);
        }
    }

    min.zip(max)
}

/// Envelope covering `points`, or `None` for an empty sequence.
pub fn envelope_from_points<P>(points: impl Iterator<Item = P>) -> Option<AABB<[f64; 2]>>
where
    P: Into<[f64; 2]>,
{
    bounds_from_points(points).map(|(min, max)| AABB::from_corners(min, max))
}
