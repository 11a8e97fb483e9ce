pub fn mean(xs: impl Iterator<Item = f64>) -> f64 {
    let mut count = 0;
    let mut total = 0.0;
    for x in xs {
        count += 1;
        total += x;
    }
    assert_ne!(count, 0);
    total / count as f64
}

pub fn mse(xs: impl Iterator<Item = f64> + Clone) -> f64 {
    let n = xs.clone().count() as f64;
    let m = mean(xs.clone());
    xs.map(|x| (x - m).powi(2)).sum::<f64>() / n
}

/// Root mean squared error over `(predicted, actual)` pairs.
pub fn rmse(pairs: impl Iterator<Item = (f64, f64)>) -> f64 {
    mean(pairs.map(|(p, a)| (p - a).powi(2))).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mse_works() {
        assert_eq!(mse([1.0, 3.0].iter().copied()), 1.0);
        assert_eq!(mse([2.0].iter().copied()), 0.0);
    }

    #[test]
    fn rmse_works() {
        let pairs = vec![(1.0, 4.0), (2.0, -2.0)];
        assert_eq!(rmse(pairs.into_iter()), 12.5f64.sqrt());
    }
}
