//! Construction of initializer and proxy constructor calldata

use alloy::{
    dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier},
    json_abi::{Function, JsonAbi},
};
use alloy_primitives::{Address, Bytes};
use alloy_sol_types::SolValue;

use crate::{
    artifacts::CompiledContract, constants::INITIALIZER_FN, errors::DeploymentError,
    types::DeploymentPhase, types::ProxyKind,
};

/// Prepare calldata for the implementation's `initialize` method.
///
/// The overload is selected by arity. Each argument is coerced from its string form to the
/// declared parameter type; empty arguments and the zero address are rejected. An ABI with
/// no initializer yields empty calldata, but only when no arguments were given.
pub fn initializer_calldata(abi: &JsonAbi, args: &[String]) -> Result<Bytes, DeploymentError> {
    let Some(overloads) = abi.function(INITIALIZER_FN) else {
        if args.is_empty() {
            return Ok(Bytes::new());
        }

        return Err(mismatch(format!(
            "implementation has no `{INITIALIZER_FN}` function, but {} argument(s) were given",
            args.len()
        )));
    };

    let initializer = select_overload(overloads, args.len())?;
    let values = initializer
        .inputs
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty = param.resolve().map_err(|e| {
                DeploymentError::compilation(DeploymentPhase::NotStarted, e.to_string())
            })?;
            coerce_arg(&param.name, &ty, arg)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let calldata = initializer.abi_encode_input(&values).map_err(|e| mismatch(e.to_string()))?;
    Ok(calldata.into())
}

/// Select the single `initialize` overload taking `arity` arguments
fn select_overload(overloads: &[Function], arity: usize) -> Result<&Function, DeploymentError> {
    let mut candidates = overloads.iter().filter(|f| f.inputs.len() == arity);
    match (candidates.next(), candidates.next()) {
        (Some(f), None) => Ok(f),
        (None, _) => {
            let expected =
                overloads.iter().map(|f| f.signature()).collect::<Vec<_>>().join(", ");
            Err(mismatch(format!("expected arguments for one of [{expected}], got {arity}")))
        }
        (Some(_), Some(_)) => Err(mismatch(format!(
            "ambiguous `{INITIALIZER_FN}` overloads taking {arity} arguments"
        ))),
    }
}

/// Coerce a single string argument to the given Solidity type
fn coerce_arg(name: &str, ty: &DynSolType, arg: &str) -> Result<DynSolValue, DeploymentError> {
    let arg = arg.trim();
    if arg.is_empty() {
        return Err(mismatch(format!("argument `{name}` ({ty}) is empty")));
    }

    let value = ty
        .coerce_str(arg)
        .map_err(|e| mismatch(format!("argument `{name}` is not a valid {ty}: {e}")))?;

    if let DynSolValue::Address(address) = value {
        if address.is_zero() {
            return Err(mismatch(format!("argument `{name}` is the zero address")));
        }
    }

    Ok(value)
}

/// Append the ABI-encoded proxy constructor arguments to the proxy creation bytecode.
///
/// The initializer calldata is passed to the proxy constructor, so the proxy is initialized
/// in the same transaction that creates it.
pub fn proxy_creation_code(
    proxy: &CompiledContract,
    kind: ProxyKind,
    implementation: Address,
    initial_owner: Address,
    init_calldata: Bytes,
) -> Bytes {
    let constructor_args = match kind {
        ProxyKind::Uups => (implementation, init_calldata).abi_encode_params(),
        ProxyKind::Transparent => {
            (implementation, initial_owner, init_calldata).abi_encode_params()
        }
    };

    [proxy.bytecode.as_ref(), constructor_args.as_slice()].concat().into()
}

/// Build an argument mismatch error; all argument checks run before submission
fn mismatch(message: String) -> DeploymentError {
    DeploymentError::argument_mismatch(DeploymentPhase::NotStarted, message)
}
