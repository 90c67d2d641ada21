use numpy::{PyArray1, PyArrayMethods, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::{
    dense::{DenseSys, VecCb},
    integrate::{self, Method, Options},
    record::RecordFlags,
    result::OdeResult,
    status::OdeStatus,
    tolerance::Tolerance,
    Float,
};

/// Wrap a Python callable `f(x, y, p) -> array_like` as a vector callback.
/// A raised exception maps to an unrecoverable error; the callable may also
/// return `None` to signal a recoverable one.
fn vec_cb_from_py(fun: Py<PyAny>) -> VecCb {
    Box::new(move |x, y, p, out| {
        Python::with_gil(|py| {
            let y_arr = PyArray1::from_slice(py, y);
            let p_arr = PyArray1::from_slice(py, &p.p);
            let res = match fun.call1(py, (x, y_arr, p_arr)) {
                Ok(r) => r,
                Err(_) => return OdeStatus::UnrecoverableError,
            };
            let bound = res.bind(py);
            if bound.is_none() {
                return OdeStatus::RecoverableError;
            }
            if let Ok(arr) = bound.extract::<PyReadonlyArray1<Float>>() {
                if let Ok(s) = arr.as_slice() {
                    if s.len() == out.len() {
                        out.copy_from_slice(s);
                        return OdeStatus::Success;
                    }
                }
                OdeStatus::UnrecoverableError
            } else if let Ok(arr) = bound.extract::<PyReadonlyArray2<Float>>() {
                if let Ok(s) = arr.as_slice() {
                    if s.len() == out.len() {
                        out.copy_from_slice(s);
                        return OdeStatus::Success;
                    }
                }
                OdeStatus::UnrecoverableError
            } else if let Ok(v) = bound.extract::<Vec<Float>>() {
                if v.len() == out.len() {
                    out.copy_from_slice(&v);
                    return OdeStatus::Success;
                }
                OdeStatus::UnrecoverableError
            } else {
                OdeStatus::UnrecoverableError
            }
        })
    })
}

fn tolerance_from_py(obj: &Bound<'_, PyAny>) -> PyResult<Tolerance> {
    if let Ok(v) = obj.extract::<Float>() {
        return Ok(Tolerance::Scalar(v));
    }
    if let Ok(v) = obj.extract::<Vec<Float>>() {
        return Ok(Tolerance::Vector(v));
    }
    Err(pyo3::exceptions::PyTypeError::new_err(
        "tolerance must be a float or a sequence of floats",
    ))
}

fn method_from_str(name: &str) -> PyResult<Method> {
    match name.to_ascii_lowercase().as_str() {
        "adaptive" | "rk23" => Ok(Method::Adaptive),
        "euler_forward" => Ok(Method::EulerForward),
        "midpoint" => Ok(Method::Midpoint),
        "rk4" => Ok(Method::Rk4),
        "euler_backward" => Ok(Method::EulerBackward),
        "trapezoidal" => Ok(Method::Trapezoidal),
        "bdf2" => Ok(Method::Bdf2),
        other => Err(pyo3::exceptions::PyValueError::new_err(format!(
            "unknown method: {}",
            other
        ))),
    }
}

/// ODE system bound to Python callables.
///
/// The callables receive `(x, y, p)` with `y` and `p` as 1-d numpy arrays.
#[pyclass(name = "OdeSys", module = "odesys", unsendable)]
struct PyOdeSys {
    inner: DenseSys,
}

#[pymethods]
impl PyOdeSys {
    #[new]
    #[pyo3(signature = (
        ny, rhs, jac=None, dfdx=None, roots=None, nroots=0,
        invariants=None, ninvar=0, max_invariant_violation=0.0,
        params=Vec::new(), atol=None, rtol=1e-8,
        lower_bounds=Vec::new(), upper_bounds=Vec::new(),
        get_dx_max_factor=0.0, special_settings=Vec::new(),
        autonomous_exprs=false, record_rhs_xvals=false,
        record_jac_xvals=false, record_order=false, record_fpe=false,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        ny: usize,
        rhs: Py<PyAny>,
        jac: Option<Py<PyAny>>,
        dfdx: Option<Py<PyAny>>,
        roots: Option<Py<PyAny>>,
        nroots: usize,
        invariants: Option<Py<PyAny>>,
        ninvar: usize,
        max_invariant_violation: Float,
        params: Vec<Float>,
        atol: Option<Bound<'_, PyAny>>,
        rtol: Float,
        lower_bounds: Vec<Float>,
        upper_bounds: Vec<Float>,
        get_dx_max_factor: Float,
        special_settings: Vec<Float>,
        autonomous_exprs: bool,
        record_rhs_xvals: bool,
        record_jac_xvals: bool,
        record_order: bool,
        record_fpe: bool,
    ) -> PyResult<Self> {
        let atol = match atol {
            Some(obj) => tolerance_from_py(&obj)?,
            None => Tolerance::Scalar(1e-8),
        };
        let mut sys = DenseSys::new(ny, vec_cb_from_py(rhs), params, atol, rtol)
            .with_special_settings(special_settings)
            .with_dx_max_factor(get_dx_max_factor)
            .with_flags(RecordFlags {
                autonomous_exprs,
                record_rhs_xvals,
                record_jac_xvals,
                record_order,
                record_fpe,
            });
        if let Some(jac) = jac {
            sys = sys.with_jac(vec_cb_from_py(jac));
        }
        if let Some(dfdx) = dfdx {
            sys = sys.with_dfdx(vec_cb_from_py(dfdx));
        }
        if let Some(roots) = roots {
            sys = sys.with_roots(nroots, vec_cb_from_py(roots));
        }
        if let Some(invariants) = invariants {
            sys = sys.with_invariants(ninvar, vec_cb_from_py(invariants), max_invariant_violation);
        }
        if !lower_bounds.is_empty() || !upper_bounds.is_empty() {
            sys = sys.with_bounds(lower_bounds, upper_bounds);
        }
        Ok(Self { inner: sys })
    }

    /// Evaluate the right-hand side at `(x, y)`.
    fn rhs<'py>(
        &mut self,
        py: Python<'py>,
        x: Float,
        y: PyReadonlyArray1<'py, Float>,
    ) -> PyResult<Bound<'py, PyArray1<Float>>> {
        use crate::system::OdeSys;
        let y = y.as_slice()?;
        let mut f = vec![0.0; self.inner.ny()];
        let status = self.inner.rhs(x, y, &mut f);
        if !status.is_success() {
            return Err(pyo3::exceptions::PyRuntimeError::new_err(format!(
                "rhs failed with status {}",
                status.as_int()
            )));
        }
        Ok(PyArray1::from_vec(py, f))
    }

    /// Evaluate the dense Jacobian in row-major layout, shape `(ny, ny)`.
    fn dense_jac_rmaj<'py>(
        &mut self,
        py: Python<'py>,
        x: Float,
        y: PyReadonlyArray1<'py, Float>,
    ) -> PyResult<Bound<'py, PyAny>> {
        self.jac_impl(py, x, y, false)
    }

    /// Evaluate the dense Jacobian in column-major layout, shape `(ny, ny)`.
    fn dense_jac_cmaj<'py>(
        &mut self,
        py: Python<'py>,
        x: Float,
        y: PyReadonlyArray1<'py, Float>,
    ) -> PyResult<Bound<'py, PyAny>> {
        self.jac_impl(py, x, y, true)
    }

    /// Evaluate the root functions at `(x, y)`.
    fn roots<'py>(
        &mut self,
        py: Python<'py>,
        x: Float,
        y: PyReadonlyArray1<'py, Float>,
    ) -> PyResult<Bound<'py, PyArray1<Float>>> {
        use crate::system::OdeSys;
        let y = y.as_slice()?;
        let mut out = vec![0.0; self.inner.nroots()];
        let status = self.inner.roots(x, y, &mut out);
        if !status.is_success() {
            return Err(pyo3::exceptions::PyRuntimeError::new_err(format!(
                "roots failed with status {}",
                status.as_int()
            )));
        }
        Ok(PyArray1::from_vec(py, out))
    }

    /// Diagnostics recorded since the last run.
    fn records<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let rec = self.inner.records();
        let d = PyDict::new(py);
        d.set_item("nfev", rec.nfev)?;
        d.set_item("njev", rec.njev)?;
        d.set_item("nrev", rec.nrev)?;
        d.set_item("rhs_xvals", PyArray1::from_slice(py, &rec.rhs_xvals))?;
        d.set_item("jac_xvals", PyArray1::from_slice(py, &rec.jac_xvals))?;
        d.set_item("orders", rec.orders.clone())?;
        d.set_item("fpes", rec.fpes.clone())?;
        Ok(d)
    }
}

impl PyOdeSys {
    fn jac_impl<'py>(
        &mut self,
        py: Python<'py>,
        x: Float,
        y: PyReadonlyArray1<'py, Float>,
        cmaj: bool,
    ) -> PyResult<Bound<'py, PyAny>> {
        use crate::system::OdeSys;
        let y = y.as_slice()?;
        let n = self.inner.ny();
        let mut jac = vec![0.0; n * n];
        let status = if cmaj {
            self.inner.dense_jac_cmaj(x, y, None, &mut jac, n, None)
        } else {
            self.inner.dense_jac_rmaj(x, y, None, &mut jac, n, None)
        };
        if !status.is_success() {
            return Err(pyo3::exceptions::PyRuntimeError::new_err(format!(
                "jacobian failed with status {}",
                status.as_int()
            )));
        }
        Ok(PyArray1::from_vec(py, jac).reshape((n, n))?.into_any())
    }
}

fn build_options(
    method: Method,
    rtol: Option<Bound<'_, PyAny>>,
    atol: Option<Bound<'_, PyAny>>,
    dx0: Option<Float>,
    dx_max: Option<Float>,
    dx_min: Option<Float>,
    nmax: usize,
    return_on_root: bool,
) -> PyResult<Options> {
    let rtol = match rtol {
        Some(obj) => tolerance_from_py(&obj)?,
        None => Tolerance::Scalar(1e-8),
    };
    let atol = match atol {
        Some(obj) => tolerance_from_py(&obj)?,
        None => Tolerance::Scalar(1e-8),
    };
    Ok(Options::builder()
        .method(method)
        .rtol(rtol)
        .atol(atol)
        .maybe_dx0(dx0)
        .maybe_dx_max(dx_max)
        .maybe_dx_min(dx_min)
        .nmax(nmax)
        .return_on_root(return_on_root)
        .build())
}

fn result_to_py<'py>(
    py: Python<'py>,
    sys: &PyOdeSys,
    result: OdeResult,
) -> PyResult<(
    Bound<'py, PyArray1<Float>>,
    Bound<'py, PyAny>,
    Bound<'py, PyDict>,
)> {
    let npoints = result.xout.len();
    let ny = if npoints > 0 { result.yout[0].len() } else { 0 };
    let mut flat = Vec::with_capacity(npoints * ny);
    for row in &result.yout {
        flat.extend_from_slice(row);
    }
    let x_arr = PyArray1::from_vec(py, result.xout);
    let y_arr = PyArray1::from_vec(py, flat)
        .reshape((npoints, ny))?
        .into_any();

    let info = PyDict::new(py);
    info.set_item("nfev", result.info.nfev)?;
    info.set_item("njev", result.info.njev)?;
    info.set_item("nlu", result.info.nlu)?;
    info.set_item("nrev", result.info.nrev)?;
    info.set_item("naccpt", result.info.naccpt)?;
    info.set_item("nrejct", result.info.nrejct)?;
    info.set_item("status", format!("{:?}", result.info.status))?;
    info.set_item("success", result.info.success)?;
    info.set_item("root_xvals", PyArray1::from_vec(py, result.root_xvals))?;
    info.set_item("root_indices", result.root_indices)?;
    // Per-instance diagnostic recordings, when the flags are on.
    let rec = sys.inner.records();
    info.set_item("rhs_xvals", PyArray1::from_slice(py, &rec.rhs_xvals))?;
    info.set_item("jac_xvals", PyArray1::from_slice(py, &rec.jac_xvals))?;
    info.set_item("orders", rec.orders.clone())?;
    info.set_item("fpes", rec.fpes.clone())?;
    Ok((x_arr, y_arr, info))
}

fn run_errors_to_py(errors: Vec<crate::error::Error>) -> PyErr {
    let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    pyo3::exceptions::PyValueError::new_err(msgs.join("; "))
}

/// Integrate from `x0` to `xend` with adaptive steps, returning
/// `(xout, yout, info)`.
#[pyfunction]
#[pyo3(name = "integrate_adaptive")]
#[pyo3(signature = (
    sys, x0, xend, y0, rtol=None, atol=None, dx0=None, dx_max=None,
    dx_min=None, nmax=100_000, return_on_root=false,
))]
#[allow(clippy::too_many_arguments)]
fn integrate_adaptive_py<'py>(
    py: Python<'py>,
    sys: &Bound<'py, PyOdeSys>,
    x0: Float,
    xend: Float,
    y0: Vec<Float>,
    rtol: Option<Bound<'py, PyAny>>,
    atol: Option<Bound<'py, PyAny>>,
    dx0: Option<Float>,
    dx_max: Option<Float>,
    dx_min: Option<Float>,
    nmax: usize,
    return_on_root: bool,
) -> PyResult<(
    Bound<'py, PyArray1<Float>>,
    Bound<'py, PyAny>,
    Bound<'py, PyDict>,
)> {
    let opts = build_options(
        Method::Adaptive,
        rtol,
        atol,
        dx0,
        dx_max,
        dx_min,
        nmax,
        return_on_root,
    )?;
    let mut sys_ref = sys.borrow_mut();
    let result = integrate::integrate_adaptive(&mut sys_ref.inner, x0, xend, &y0, &opts)
        .map_err(run_errors_to_py)?;
    result_to_py(py, &sys_ref, result)
}

/// Integrate over a predefined output grid, returning `(xout, yout, info)`.
#[pyfunction]
#[pyo3(name = "integrate_predefined")]
#[pyo3(signature = (
    sys, xout, y0, method="adaptive", rtol=None, atol=None, dx0=None,
    dx_max=None, dx_min=None, nmax=100_000, return_on_root=false,
))]
#[allow(clippy::too_many_arguments)]
fn integrate_predefined_py<'py>(
    py: Python<'py>,
    sys: &Bound<'py, PyOdeSys>,
    xout: Vec<Float>,
    y0: Vec<Float>,
    method: &str,
    rtol: Option<Bound<'py, PyAny>>,
    atol: Option<Bound<'py, PyAny>>,
    dx0: Option<Float>,
    dx_max: Option<Float>,
    dx_min: Option<Float>,
    nmax: usize,
    return_on_root: bool,
) -> PyResult<(
    Bound<'py, PyArray1<Float>>,
    Bound<'py, PyAny>,
    Bound<'py, PyDict>,
)> {
    let opts = build_options(
        method_from_str(method)?,
        rtol,
        atol,
        dx0,
        dx_max,
        dx_min,
        nmax,
        return_on_root,
    )?;
    let mut sys_ref = sys.borrow_mut();
    let result = integrate::integrate_predefined(&mut sys_ref.inner, &xout, &y0, &opts)
        .map_err(run_errors_to_py)?;
    result_to_py(py, &sys_ref, result)
}

#[pymodule]
fn odesys(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyOdeSys>()?;
    m.add_function(wrap_pyfunction!(integrate_adaptive_py, m)?)?;
    m.add_function(wrap_pyfunction!(integrate_predefined_py, m)?)?;
    Ok(())
}
