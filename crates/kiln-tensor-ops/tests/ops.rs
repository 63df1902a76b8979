use approx::assert_relative_eq;
use kiln_tensor::{DType, ErrorKind, Tensor, TensorOptions};
use kiln_tensor_ops::{abs, cat, sum, sum_out, TensorOpsError};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn cat_interleaves_rows() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    let a = Tensor::arange(6, TensorOptions::default())?.reshape(&[2, 3])?;
    let b = Tensor::arange_from(6, 12, TensorOptions::default())?.reshape(&[2, 3])?;
    let c = cat(&[a.clone(), b.clone()], 1)?;

    assert_eq!(c.size(1)?, a.size(1)? + b.size(1)?);
    assert_eq!(c.size(0)?, a.size(0)?);
    assert_eq!(
        c.to_vec::<i64>()?,
        vec![0, 1, 2, 6, 7, 8, 3, 4, 5, 9, 10, 11]
    );
    assert!(c.narrow(1, 0, 3)?.equal(&a));
    assert!(c.narrow(1, 3, 3)?.equal(&b));
    Ok(())
}

#[test]
fn cat_error_kinds() -> Result<(), Box<dyn std::error::Error>> {
    let a = Tensor::zeros(&[2, 3], DType::Float32)?;
    let b = Tensor::zeros(&[3, 3], DType::Float32)?;
    let kind = |res: Result<Tensor, TensorOpsError>| res.err().map(|e| e.kind());
    assert_eq!(kind(cat(&[a.clone(), b], 1)), Some(ErrorKind::ShapeMismatch));
    assert_eq!(kind(cat(&[], 0)), Some(ErrorKind::InvalidArgument));
    assert_eq!(kind(cat(&[a], -3)), Some(ErrorKind::IndexError));
    Ok(())
}

#[test]
fn sum_keepdim_matches_reshape() -> Result<(), Box<dyn std::error::Error>> {
    let t = Tensor::arange(60, DType::Float64)?.reshape(&[3, 4, 5])?;
    for d in 0..3_i64 {
        let dropped = sum(&t, Some(&[d]), false, None)?;
        let kept = sum(&t, Some(&[d]), true, None)?;
        assert_eq!(dropped.dim(), t.dim() - 1);
        assert_eq!(kept.size(d)?, 1);
        let shape: Vec<i64> = kept.sizes().iter().map(|&s| s as i64).collect();
        assert!(dropped.reshape(&shape)?.equal(&kept));
    }
    let total = sum(&t, None, false, None)?;
    assert_relative_eq!(total.item::<f64>()?, 1770.0);
    Ok(())
}

#[test]
fn sum_out_writes_in_place() -> Result<(), Box<dyn std::error::Error>> {
    let input = Tensor::arange(10, DType::Int32)?;
    let mut out = Tensor::zeros(&[], DType::Int64)?;
    let ptr = out.data_ptr();
    let same = sum_out(&mut out, &input)?;
    assert_eq!(same.data_ptr(), ptr);
    assert_eq!(same.item::<i64>()?, 45);

    let mut wrong = Tensor::zeros(&[1], DType::Int64)?;
    assert!(matches!(
        sum_out(&mut wrong, &input),
        Err(TensorOpsError::ShapeMismatch { .. })
    ));
    Ok(())
}

#[test]
fn abs_leaves_input_untouched() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = Tensor::from_shape_vec(&[4], vec![1.0_f32, -2.0, 0.0, -3.5])?;
    let ptr = t.data_ptr();
    let a = abs(&t)?;
    assert_eq!(t.data_ptr(), ptr);
    assert_eq!(a.to_vec::<f32>()?, vec![1.0, 2.0, 0.0, 3.5]);

    t.zero_()?;
    assert_eq!(a.to_vec::<f32>()?, vec![1.0, 2.0, 0.0, 3.5]);
    assert!(!a.is_same(&t));
    Ok(())
}
