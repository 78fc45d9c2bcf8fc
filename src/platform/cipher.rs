//! Signature cipher deciphering for video platform.
//!
//! The player script descrambles signatures with a small function of the
//! shape
//!
//! ```js
//! var Qr=function(a){a=a.split("");Xy.Ab(a,12);Xy.Ef(a,3);Xy.Cd(a,2);return a.join("")};
//! var Xy={Ab:function(a){a.reverse()},
//!         Cd:function(a,b){a.splice(0,b)},
//!         Ef:function(a,b){var c=a[0];a[0]=a[b%a.length];a[b%a.length]=c}};
//! ```
//!
//! invoked from a call site like `c.sig||Qr(c.s)`. Rather than running the
//! script, the function body is compiled into a [`CipherProgram`] of the
//! three primitive operations the helpers perform.

use crate::error::{CipherStage, TubemapError};
use crate::platform::extractor::match_braces;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

/// Call site through which the page dispatches signature descrambling.
/// A miss fails instead of falling back to a guessed function.
const DISPATCH_PATTERN: &str = r"\.sig\|\|([a-zA-Z0-9$]+)\(";

/// A primitive cipher operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherOp {
    /// Reverse the whole sequence
    Reverse,
    /// Swap the first element with the one at `n % len`
    Swap(usize),
    /// Remove the first `n` elements
    Splice(usize),
}

impl CipherOp {
    fn apply(self, chars: &mut Vec<char>) {
        match self {
            CipherOp::Reverse => chars.reverse(),
            CipherOp::Swap(n) => {
                if !chars.is_empty() {
                    let idx = n % chars.len();
                    chars.swap(0, idx);
                }
            }
            CipherOp::Splice(n) => {
                let n = n.min(chars.len());
                chars.drain(..n);
            }
        }
    }
}

/// Compiled signature transform
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CipherProgram {
    ops: Vec<CipherOp>,
}

impl CipherProgram {
    /// Program from an explicit operation list
    pub fn new(ops: Vec<CipherOp>) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &[CipherOp] {
        &self.ops
    }

    /// Locate the transform function in `player_js` and compile it
    pub fn from_player_js(player_js: &str) -> Result<Self, TubemapError> {
        let name = locate_cipher_function(player_js)?;
        Self::compile(player_js, &name)
    }

    /// Compile the function called `name` defined in `player_js`
    pub fn compile(player_js: &str, name: &str) -> Result<Self, TubemapError> {
        let function =
            find_function(player_js, name).map_err(as_cipher(CipherStage::Definition))?;
        let ops =
            compile_body(player_js, &function).map_err(as_cipher(CipherStage::Definition))?;
        debug!("Compiled cipher function {} into {} operations", name, ops.len());
        Ok(Self { ops })
    }

    /// Run the program over a scrambled signature
    pub fn apply(&self, signature: &str) -> String {
        let mut chars: Vec<char> = signature.chars().collect();
        for op in &self.ops {
            op.apply(&mut chars);
        }
        chars.into_iter().collect()
    }
}

/// Find the name of the signature transform function in the player script
pub fn locate_cipher_function(player_js: &str) -> Result<String, TubemapError> {
    let dispatch = Regex::new(DISPATCH_PATTERN)
        .map_err(|e| as_cipher(CipherStage::Locator)(e.into()))?;
    let name = dispatch
        .captures(player_js)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            TubemapError::cipher(
                CipherStage::Locator,
                "signature dispatch call site not found in player script",
            )
        })?;

    debug!("Located cipher function: {}", name);
    Ok(name)
}

/// Fold any failure into a cipher error of `stage`, keeping existing stages
fn as_cipher(stage: CipherStage) -> impl Fn(TubemapError) -> TubemapError {
    move |error| match error {
        TubemapError::Cipher { .. } => error,
        other => TubemapError::cipher(stage, other.to_string()),
    }
}

/// A function definition pulled out of the player script
#[derive(Debug)]
struct JsFunction<'a> {
    param: &'a str,
    body: &'a str,
}

fn find_function<'a>(player_js: &'a str, name: &str) -> Result<JsFunction<'a>, TubemapError> {
    let escaped = regex::escape(name);
    let definition = Regex::new(&format!(
        r"(?:function\s+{escaped}|(?:^|[{{;,\s]){escaped}\s*=\s*function)\s*\(\s*([a-zA-Z0-9$]+)[^)]*\)\s*\{{",
    ))?;

    let captures = definition.captures(player_js).ok_or_else(|| {
        TubemapError::cipher(
            CipherStage::Definition,
            format!("definition of {} not found", name),
        )
    })?;
    let open = captures.get(0).map(|m| m.end() - 1).unwrap_or_default();
    let param = captures.get(1).map(|m| m.as_str()).unwrap_or_default();

    let close = match_braces(player_js, open).ok_or_else(|| {
        TubemapError::cipher(
            CipherStage::Definition,
            format!("body of {} is not terminated", name),
        )
    })?;

    Ok(JsFunction {
        param,
        body: &player_js[open + 1..close],
    })
}

/// What a helper method does to the array, judged by its body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HelperKind {
    Reverse,
    Swap,
    Splice,
    Unknown,
}

impl HelperKind {
    fn classify(body: &str) -> Self {
        if body.contains(".reverse(") {
            HelperKind::Reverse
        } else if body.contains(".splice(") {
            HelperKind::Splice
        } else if body.contains('%') && body.contains(".length") {
            HelperKind::Swap
        } else {
            HelperKind::Unknown
        }
    }

    fn op(self, arg: usize) -> Option<CipherOp> {
        match self {
            HelperKind::Reverse => Some(CipherOp::Reverse),
            HelperKind::Swap => Some(CipherOp::Swap(arg)),
            HelperKind::Splice => Some(CipherOp::Splice(arg)),
            HelperKind::Unknown => None,
        }
    }
}

/// Methods of the helper object literal assigned to `object`
fn helper_methods(player_js: &str, object: &str) -> Result<HashMap<String, HelperKind>, TubemapError> {
    let escaped = regex::escape(object);
    let definition = Regex::new(&format!(r"(?:^|[{{;,\s]){escaped}\s*=\s*\{{"))?;
    let open = definition
        .find(player_js)
        .map(|m| m.end() - 1)
        .ok_or_else(|| {
            TubemapError::cipher(
                CipherStage::Definition,
                format!("helper object {} not found", object),
            )
        })?;
    let close = match_braces(player_js, open).ok_or_else(|| {
        TubemapError::cipher(
            CipherStage::Definition,
            format!("helper object {} is not terminated", object),
        )
    })?;
    let literal = &player_js[open + 1..close];

    let method = Regex::new(
        r#"(?:^|,)\s*["']?([a-zA-Z0-9$]+)["']?\s*:\s*function\s*\([^)]*\)\s*\{([^{}]*)\}"#,
    )?;
    let methods: HashMap<String, HelperKind> = method
        .captures_iter(literal)
        .map(|c| (c[1].to_string(), HelperKind::classify(&c[2])))
        .collect();

    debug!("Helper object {} has {} methods", object, methods.len());
    Ok(methods)
}

/// A `obj.method(param, n)` statement of the transform function
struct HelperCall<'a> {
    object: &'a str,
    method: &'a str,
    arg: usize,
}

fn compile_body(player_js: &str, function: &JsFunction<'_>) -> Result<Vec<CipherOp>, TubemapError> {
    let param = regex::escape(function.param);
    let split = Regex::new(&format!(r#"^{param}\s*=\s*{param}\.split\(\s*(?:""|'')\s*\)$"#))?;
    let join = Regex::new(&format!(r#"^return\s+{param}\.join\(\s*(?:""|'')\s*\)$"#))?;
    let call = Regex::new(&format!(
        r"^([a-zA-Z0-9$]+)\.([a-zA-Z0-9$]+)\(\s*{param}\s*(?:,\s*(\d+)\s*)?\)$"
    ))?;

    let mut calls = Vec::new();
    for statement in function.body.split(';').map(str::trim) {
        if statement.is_empty() || split.is_match(statement) || join.is_match(statement) {
            continue;
        }

        let captures = call.captures(statement).ok_or_else(|| {
            TubemapError::cipher(
                CipherStage::UnsupportedOperation,
                format!("unrecognized statement {:?}", statement),
            )
        })?;
        let arg = match captures.get(3) {
            Some(m) => m.as_str().parse::<usize>().map_err(|e| {
                TubemapError::cipher(
                    CipherStage::UnsupportedOperation,
                    format!("argument {:?}: {}", m.as_str(), e),
                )
            })?,
            None => 0,
        };
        calls.push(HelperCall {
            object: captures.get(1).map_or("", |m| m.as_str()),
            method: captures.get(2).map_or("", |m| m.as_str()),
            arg,
        });
    }

    let Some(first) = calls.first() else {
        return Ok(Vec::new());
    };
    if let Some(other) = calls.iter().find(|c| c.object != first.object) {
        return Err(TubemapError::cipher(
            CipherStage::UnsupportedOperation,
            format!("calls into both {} and {}", first.object, other.object),
        ));
    }

    let methods = helper_methods(player_js, first.object)?;
    calls
        .iter()
        .map(|c| {
            methods
                .get(c.method)
                .and_then(|kind| kind.op(c.arg))
                .ok_or_else(|| {
                    TubemapError::cipher(
                        CipherStage::UnsupportedOperation,
                        format!("helper {}.{} is not reverse, swap or splice", c.object, c.method),
                    )
                })
        })
        .collect()
}
