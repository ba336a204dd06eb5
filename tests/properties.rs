use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use ndops::{
    view, Arg, BinaryOp, DType, KernelError, OpKind, Ops, StridedView, Template, Variant,
    MAX_RANK,
};

fn random_dims(rng: &mut StdRng, max_rank: usize) -> Vec<usize> {
    let rank = rng.gen_range(1..=max_rank);
    (0..rank).map(|_| rng.gen_range(1..5)).collect()
}

fn iota(dims: &[usize]) -> StridedView<'static, f64> {
    let n: usize = dims.iter().product();
    view((0..n).map(|i| i as f64).collect(), dims).unwrap()
}

/// Every coordinate of `dims` in row-major order.
fn coords(dims: &[usize]) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    StridedView::<u8>::zeros(dims).for_each(|idx, _| out.push(idx.to_vec()));
    out
}

#[test]
fn test_get_reproduces_row_major_data() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
        let dims = random_dims(&mut rng, 4);
        let a = iota(&dims);
        for (flat, idx) in coords(&dims).iter().enumerate() {
            assert_eq!(a.get(idx), flat as f64);
        }
    }
    let v = view(vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    assert_eq!(v.get(&[1, 2]), 6.0);
}

#[test]
fn test_transpose_then_inverse_is_identity() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..20 {
        let dims = random_dims(&mut rng, 5);
        let mut perm: Vec<usize> = (0..dims.len()).collect();
        perm.shuffle(&mut rng);
        let mut inverse = vec![0; perm.len()];
        for (k, &p) in perm.iter().enumerate() {
            inverse[p] = k;
        }

        let a = iota(&dims);
        let t = a.transpose(&perm).unwrap();
        for idx in coords(t.dims()) {
            let src: Vec<usize> = inverse.iter().map(|&k| idx[k]).collect();
            assert_eq!(t.get(&idx), a.get(&src));
        }
        let back = t.transpose(&inverse).unwrap();
        assert_eq!(back.dims(), a.dims());
        assert_eq!(back.strides(), a.strides());
        assert_eq!(back.to_vec(), a.to_vec());
    }
}

#[test]
fn test_window_transforms_address_the_parent() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..20 {
        let dims: Vec<usize> = (0..rng.gen_range(1..=3)).map(|_| rng.gen_range(2..6)).collect();
        let a = iota(&dims);
        let bounds: Vec<usize> = dims.iter().map(|&d| rng.gen_range(0..d)).collect();

        let lo = a.lo(&bounds.iter().map(|&b| Some(b)).collect::<Vec<_>>());
        for idx in coords(lo.dims()) {
            let src: Vec<usize> = idx.iter().zip(&bounds).map(|(i, b)| i + b).collect();
            assert_eq!(lo.get(&idx), a.get(&src));
        }

        let caps: Vec<Option<usize>> = bounds.iter().map(|&b| Some(b + 1)).collect();
        let hi = a.hi(&caps);
        for idx in coords(hi.dims()) {
            assert_eq!(hi.get(&idx), a.get(&idx));
        }

        let steps: Vec<Option<isize>> = dims.iter().map(|_| Some(rng.gen_range(1..3))).collect();
        let stepped = a.step(&steps).unwrap();
        for idx in coords(stepped.dims()) {
            let src: Vec<usize> = idx
                .iter()
                .zip(&steps)
                .map(|(&i, s)| i * s.unwrap_or(1) as usize)
                .collect();
            assert_eq!(stepped.get(&idx), a.get(&src));
        }

        let mut pick = vec![None; dims.len()];
        pick[0] = Some(bounds[0]);
        let picked = a.pick(&pick);
        assert_eq!(picked.ndim(), dims.len() - 1);
        for idx in coords(picked.dims()) {
            let mut src = vec![bounds[0]];
            src.extend(&idx);
            assert_eq!(picked.get(&idx), a.get(&src));
        }
    }
}

#[test]
fn test_reversed_step() {
    let a = view(vec![1i16, 2, 3, 4, 5], &[5]).unwrap();
    assert_eq!(a.step(&[Some(-2)]).unwrap().to_vec(), vec![5, 3, 1]);
}

#[test]
fn test_same_layout_compiles_once() {
    let ops = Ops::new();
    let add = ops.get(OpKind::Binary(BinaryOp::Add), Variant::Plain).unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..4 {
        let a = view((0..12).map(|_| rng.gen::<f32>()).collect(), &[3, 4]).unwrap();
        let b = view((0..12).map(|_| rng.gen::<f32>()).collect(), &[3, 4]).unwrap();
        let dst = StridedView::<f32>::zeros(&[3, 4]);
        ops.binary(BinaryOp::Add, &dst, &a, &b).unwrap();
        for idx in coords(&[3, 4]) {
            assert_relative_eq!(dst.get(&idx), a.get(&idx) + b.get(&idx));
        }
    }
    assert_eq!(add.stats().builds, 1);
    assert_eq!(add.stats().hits, 3);

    // windows of one parent share strides and offset, so extents are free
    let parent = StridedView::<f32>::zeros(&[3, 4]);
    let small = parent.hi(&[Some(2), Some(2)]);
    ops.binary(BinaryOp::Add, &small, &small, 1.0).unwrap();
    ops.binary(BinaryOp::Add, &parent, &parent, 1.0).unwrap();
    assert_eq!(add.stats().builds, 2);
    assert_eq!(parent.get(&[0, 0]), 2.0);
    assert_eq!(parent.get(&[2, 3]), 1.0);
}

#[test]
fn test_allocating_binary_op() {
    let ops = Ops::new();
    let a = view(vec![1.0f64, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
    let b = view(vec![5.0f64, 6.0, 7.0, 8.0], &[2, 2]).unwrap();
    let c = ops.binary_new(BinaryOp::Add, &a, &b).unwrap();
    assert_eq!(c.dims(), &[2, 2]);
    assert_eq!(c.dtype(), DType::F64);
    assert_eq!(c.to_vec(), vec![6.0, 8.0, 10.0, 12.0]);
    assert_eq!(a.to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(b.to_vec(), vec![5.0, 6.0, 7.0, 8.0]);
    assert!(!c.shares_buffer_with(&a));
}

#[test]
fn test_sum_of_ones_up_to_max_rank() {
    let ops = Ops::new();
    let mut rng = StdRng::seed_from_u64(13);
    for rank in 0..=MAX_RANK {
        let dims: Vec<usize> = (0..rank).map(|_| rng.gen_range(1..4)).collect();
        let ones = StridedView::<f64>::ones(&dims);
        let expected: usize = dims.iter().product();
        assert_eq!(ops.sum(&ones).unwrap(), expected as f64, "dims {:?}", dims);
    }
    let too_deep = StridedView::<f64>::ones(&[1; MAX_RANK + 1]);
    assert!(matches!(
        ops.sum(&too_deep),
        Err(KernelError::RankLimit { rank, .. }) if rank == MAX_RANK + 1
    ));
}

#[test]
fn test_statistics() {
    let ops = Ops::new();
    let m = view(vec![5.0f64, 1.0, 4.0, 2.0, 3.0], &[5]).unwrap();
    assert_eq!(ops.median(&m), 3.0);

    let h = view(vec![1.0f64, 1.0, 2.0, 2.0, 2.0, 3.0], &[6]).unwrap();
    let hist = ops.histogram(&h, 1.0, 1.0, 3.0).unwrap();
    assert_eq!(hist.counts.to_vec(), vec![2, 3, 1]);
}

#[test]
fn test_user_template_with_loop_indices() {
    let ops = Ops::new();
    let src = "
        var total = 0
        ---
        a[...] = iY * 10 + iX
        total += a[...]
        ---
        return total
    ";
    let op = ops.compile(Template::parse("ramp", &["a"], src).unwrap());
    let a = StridedView::<i32>::zeros(&[2, 3]);
    let total = op.call(&[Arg::from(&a)]).unwrap().number().unwrap();
    assert_eq!(a.to_vec(), vec![0, 1, 2, 10, 11, 12]);
    assert_eq!(total, 36.0);
}

#[test]
fn test_mixed_dtypes_convert_on_store() {
    let ops = Ops::new();
    let a = view(vec![250u8, 10], &[2]).unwrap();
    let b = view(vec![10.0f64, -20.0], &[2]).unwrap();
    let f = StridedView::<f64>::zeros(&[2]);
    ops.binary(BinaryOp::Add, &f, &a, &b).unwrap();
    assert_eq!(f.to_vec(), vec![260.0, -10.0]);
    let i = StridedView::<i16>::zeros(&[2]);
    ops.binary(BinaryOp::Add, &i, &a, &b).unwrap();
    assert_eq!(i.to_vec(), vec![260, -10]);
}
