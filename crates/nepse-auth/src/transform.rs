//! Bytecode transform runner
//!
//! The portal ships a small precompiled wasm module whose exported functions
//! turn the five response salts into token cut indices. This module loads
//! that artifact once and exposes the five-argument call contract behind
//! [`TokenTransform`], so the descrambler never touches the runtime directly
//! and tests can substitute a deterministic stub.

use parking_lot::Mutex;
use std::path::Path;
use wasmi::{Engine, Func, Instance, Linker, Module, Store, Val};

use crate::error::{AuthError, AuthResult};

/// Environment variable holding the path to the transform module
pub const TRANSFORM_PATH_ENV: &str = "NEPSE_WASM_PATH";

/// The five exports every transform module must provide
pub const TRANSFORM_EXPORTS: [&str; 5] = ["cdx", "rdx", "bdx", "ndx", "mdx"];

/// Call contract for the salt transform functions
///
/// Each named function takes an ordered 5-tuple of integers and yields one
/// integer. Implementations must be pure: identical arguments always produce
/// identical results.
pub trait TokenTransform {
    /// Invoke the named transform function with five integer arguments
    fn invoke(&self, name: &str, args: [i64; 5]) -> AuthResult<i64>;
}

impl<T: TokenTransform + ?Sized> TokenTransform for &T {
    fn invoke(&self, name: &str, args: [i64; 5]) -> AuthResult<i64> {
        (**self).invoke(name, args)
    }
}

/// Transform runner backed by a wasm module
///
/// The module is parsed, instantiated and validated at construction: a
/// missing or zero-result export is an [`AuthError::TransformLoad`] raised
/// immediately, not on first use.
///
/// # Example
///
/// ```no_run
/// use nepse_auth::{TokenTransform, WasmTransform};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transform = WasmTransform::from_file("assets/css.wasm")?;
/// let cut = transform.invoke("cdx", [10, 20, 30, 40, 50])?;
/// println!("first cut index: {}", cut);
/// # Ok(())
/// # }
/// ```
pub struct WasmTransform {
    inner: Mutex<TransformInstance>,
}

struct TransformInstance {
    store: Store<()>,
    exports: Vec<(&'static str, Func)>,
}

impl WasmTransform {
    /// Load a transform module from raw wasm bytes
    pub fn from_bytes(bytes: &[u8]) -> AuthResult<Self> {
        let engine = Engine::default();
        let module = Module::new(&engine, bytes)
            .map_err(|e| AuthError::TransformLoad(e.to_string()))?;

        let mut store = Store::new(&engine, ());
        let linker = Linker::<()>::new(&engine);
        let instance = linker
            .instantiate(&mut store, &module)
            .and_then(|pre| pre.start(&mut store))
            .map_err(|e| AuthError::TransformLoad(e.to_string()))?;

        let mut exports = Vec::with_capacity(TRANSFORM_EXPORTS.len());
        for name in TRANSFORM_EXPORTS {
            exports.push((name, Self::resolve_export(&store, &instance, name)?));
        }

        Ok(Self {
            inner: Mutex::new(TransformInstance { store, exports }),
        })
    }

    /// Load a transform module from a file on disk
    pub fn from_file(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            AuthError::TransformLoad(format!("reading {}: {}", path.display(), e))
        })?;
        Self::from_bytes(&bytes)
    }

    /// Load the transform module named by `NEPSE_WASM_PATH`
    pub fn from_env() -> AuthResult<Self> {
        let path = std::env::var(TRANSFORM_PATH_ENV).map_err(|_| {
            AuthError::TransformLoad(format!("{} is not set", TRANSFORM_PATH_ENV))
        })?;
        Self::from_file(path)
    }

    fn resolve_export(store: &Store<()>, instance: &Instance, name: &'static str) -> AuthResult<Func> {
        let func = instance.get_func(store, name).ok_or_else(|| {
            AuthError::TransformLoad(format!("module has no export `{}`", name))
        })?;

        let ty = func.ty(store);
        if ty.params().len() != TRANSFORM_EXPORTS.len() {
            return Err(AuthError::TransformLoad(format!(
                "export `{}` takes {} arguments, expected 5",
                name,
                ty.params().len()
            )));
        }
        if ty.results().is_empty() {
            return Err(AuthError::TransformLoad(format!(
                "export `{}` returns no value",
                name
            )));
        }

        Ok(func)
    }
}

impl TokenTransform for WasmTransform {
    fn invoke(&self, name: &str, args: [i64; 5]) -> AuthResult<i64> {
        let inner = &mut *self.inner.lock();

        let func = inner
            .exports
            .iter()
            .find(|(export, _)| *export == name)
            .map(|(_, func)| *func)
            .ok_or_else(|| AuthError::Transform {
                name: name.to_string(),
                reason: "not a transform export".to_string(),
            })?;

        let ty = func.ty(&inner.store);
        let params = ty
            .params()
            .iter()
            .zip(args)
            .map(|(param, value)| match param {
                wasmi::core::ValType::I64 => Ok(Val::I64(value)),
                wasmi::core::ValType::I32 => {
                    i32::try_from(value).map(Val::I32).map_err(|_| AuthError::Transform {
                        name: name.to_string(),
                        reason: format!("argument {} out of i32 range", value),
                    })
                }
                other => Err(AuthError::Transform {
                    name: name.to_string(),
                    reason: format!("unsupported parameter type {:?}", other),
                }),
            })
            .collect::<AuthResult<Vec<Val>>>()?;

        let mut results = vec![Val::I32(0); ty.results().len()];
        func.call(&mut inner.store, &params, &mut results)
            .map_err(|e| AuthError::Transform {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        // The call contract is one integer; take the first result if the
        // module yields a sequence.
        match results.first() {
            Some(Val::I32(v)) => Ok(i64::from(*v)),
            Some(Val::I64(v)) => Ok(*v),
            other => Err(AuthError::Transform {
                name: name.to_string(),
                reason: format!("unsupported result {:?}", other),
            }),
        }
    }
}

impl std::fmt::Debug for WasmTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmTransform")
            .field("exports", &TRANSFORM_EXPORTS)
            .finish()
    }
}
