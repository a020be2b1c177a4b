//! Built-in Excel functions

pub mod criteria;
pub mod date;
pub mod financial;
pub mod info;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod statistical;
pub mod text;
pub mod wildcard;

use crate::context::EvaluationContext;
use crate::error::{FormulaError, FormulaResult};
use crate::thunk::{Thunk, ValueThunk};
use ahash::AHashMap;
use heron_calc_core::FormulaValue;
use once_cell::sync::Lazy;

/// Eager function implementation signature
///
/// Arguments arrive already resolved; the context supplies the few ambient
/// facts a pure function may consult (the clock, for TODAY/NOW).
pub type FunctionImpl = fn(&[FormulaValue], &EvaluationContext) -> FormulaResult<FormulaValue>;

/// Lazy function implementation signature
///
/// The short-circuiting functions receive deferred producers instead of
/// values and invoke at most one branch.
pub type LazyFunctionImpl = fn(&[&dyn Thunk], &EvaluationContext) -> FormulaResult<FormulaValue>;

/// How a function consumes its arguments
pub enum Implementation {
    Eager(FunctionImpl),
    Lazy(LazyFunctionImpl),
}

/// Function definition
pub struct FunctionDef {
    /// Function name (stable, case-sensitive)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: Implementation,
    /// Is volatile (recalculates every time)
    pub volatile: bool,
}

impl FunctionDef {
    fn eager(
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) -> Self {
        FunctionDef {
            name,
            min_args,
            max_args,
            implementation: Implementation::Eager(implementation),
            volatile: false,
        }
    }

    fn lazy(
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: LazyFunctionImpl,
    ) -> Self {
        FunctionDef {
            name,
            min_args,
            max_args,
            implementation: Implementation::Lazy(implementation),
            volatile: false,
        }
    }

    fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }
}

/// Function registry
///
/// The lookup-by-name table the external evaluator dispatches through.
pub struct FunctionRegistry {
    functions: AHashMap<&'static str, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        registry.register_math_functions();
        registry.register_logical_functions();
        registry.register_text_functions();
        registry.register_info_functions();
        registry.register_date_functions();
        registry.register_lookup_functions();
        registry.register_statistical_functions();
        registry.register_financial_functions();

        registry
    }

    /// Look up a function by its exact (case-sensitive) name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name, def);
    }

    /// Iterate over all registered names
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }

    /// Invoke a function with already-resolved argument values
    ///
    /// Lazy functions receive the values wrapped in pre-computed thunks, so
    /// hosts without deferred evaluation can still call everything.
    pub fn call(
        &self,
        name: &str,
        args: &[FormulaValue],
        ctx: &EvaluationContext,
    ) -> FormulaResult<FormulaValue> {
        let def = self
            .get(name)
            .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;
        check_arg_count(def, args.len())?;

        match def.implementation {
            Implementation::Eager(f) => f(args, ctx),
            Implementation::Lazy(f) => {
                let thunks: Vec<ValueThunk> = args.iter().cloned().map(ValueThunk).collect();
                let refs: Vec<&dyn Thunk> = thunks.iter().map(|t| t as &dyn Thunk).collect();
                f(&refs, ctx)
            }
        }
    }

    /// Invoke a function with deferred arguments
    ///
    /// Eager functions force every thunk up front; lazy functions decide
    /// which producers run.
    pub fn call_lazy(
        &self,
        name: &str,
        args: &[&dyn Thunk],
        ctx: &EvaluationContext,
    ) -> FormulaResult<FormulaValue> {
        let def = self
            .get(name)
            .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;
        check_arg_count(def, args.len())?;

        match def.implementation {
            Implementation::Lazy(f) => f(args, ctx),
            Implementation::Eager(f) => {
                let mut values = Vec::with_capacity(args.len());
                for thunk in args {
                    values.push(thunk.evaluate()?);
                }
                f(&values, ctx)
            }
        }
    }

    fn register_math_functions(&mut self) {
        self.register(FunctionDef::eager("SUM", 1, None, math::fn_sum));
        self.register(FunctionDef::eager("AVERAGE", 1, None, math::fn_average));
        self.register(FunctionDef::eager("MIN", 1, None, math::fn_min));
        self.register(FunctionDef::eager("MAX", 1, None, math::fn_max));
        self.register(FunctionDef::eager("COUNT", 1, None, math::fn_count));
        self.register(FunctionDef::eager("ABS", 1, Some(1), math::fn_abs));
        self.register(FunctionDef::eager("SIGN", 1, Some(1), math::fn_sign));
        self.register(FunctionDef::eager("INT", 1, Some(1), math::fn_int));
        self.register(FunctionDef::eager("TRUNC", 1, Some(2), math::fn_trunc));
        self.register(FunctionDef::eager("MOD", 2, Some(2), math::fn_mod));
        self.register(FunctionDef::eager("ROUND", 1, Some(2), math::fn_round));
        self.register(FunctionDef::eager("ROUNDUP", 2, Some(2), math::fn_roundup));
        self.register(FunctionDef::eager(
            "ROUNDDOWN",
            2,
            Some(2),
            math::fn_rounddown,
        ));
        self.register(FunctionDef::eager("SQRT", 1, Some(1), math::fn_sqrt));
        self.register(FunctionDef::eager("POWER", 2, Some(2), math::fn_power));
        self.register(FunctionDef::eager("EXP", 1, Some(1), math::fn_exp));
        self.register(FunctionDef::eager("LN", 1, Some(1), math::fn_ln));
        self.register(FunctionDef::eager("LOG", 1, Some(2), math::fn_log));
        self.register(FunctionDef::eager("LOG10", 1, Some(1), math::fn_log10));
        self.register(FunctionDef::eager("PI", 0, Some(0), math::fn_pi));
        self.register(FunctionDef::eager("RAND", 0, Some(0), math::fn_rand).volatile());
        self.register(
            FunctionDef::eager("RANDBETWEEN", 2, Some(2), math::fn_randbetween).volatile(),
        );
        self.register(FunctionDef::eager("SUMIF", 2, Some(3), math::fn_sumif));
        self.register(FunctionDef::eager(
            "SUMPRODUCT",
            1,
            None,
            math::fn_sumproduct,
        ));
    }

    fn register_logical_functions(&mut self) {
        // The short-circuiting family receives thunks
        self.register(FunctionDef::lazy("IF", 2, Some(3), logical::fn_if));
        self.register(FunctionDef::lazy("IFERROR", 2, Some(2), logical::fn_iferror));
        self.register(FunctionDef::lazy("IFNA", 2, Some(2), logical::fn_ifna));
        self.register(FunctionDef::lazy("IFS", 2, None, logical::fn_ifs));
        self.register(FunctionDef::lazy("SWITCH", 3, None, logical::fn_switch));

        self.register(FunctionDef::eager("AND", 1, None, logical::fn_and));
        self.register(FunctionDef::eager("OR", 1, None, logical::fn_or));
        self.register(FunctionDef::eager("NOT", 1, Some(1), logical::fn_not));
        self.register(FunctionDef::eager("XOR", 1, None, logical::fn_xor));
        self.register(FunctionDef::eager("TRUE", 0, Some(0), logical::fn_true));
        self.register(FunctionDef::eager("FALSE", 0, Some(0), logical::fn_false));
    }

    fn register_text_functions(&mut self) {
        self.register(FunctionDef::eager("LEN", 1, Some(1), text::fn_len));
        self.register(FunctionDef::eager("LEFT", 1, Some(2), text::fn_left));
        self.register(FunctionDef::eager("RIGHT", 1, Some(2), text::fn_right));
        self.register(FunctionDef::eager("MID", 3, Some(3), text::fn_mid));
        self.register(FunctionDef::eager("LOWER", 1, Some(1), text::fn_lower));
        self.register(FunctionDef::eager("UPPER", 1, Some(1), text::fn_upper));
        self.register(FunctionDef::eager("TRIM", 1, Some(1), text::fn_trim));
        self.register(FunctionDef::eager("CONCAT", 1, None, text::fn_concat));
        // Legacy alias
        self.register(FunctionDef::eager("CONCATENATE", 1, None, text::fn_concat));
        self.register(FunctionDef::eager("EXACT", 2, Some(2), text::fn_exact));
        self.register(FunctionDef::eager("REPT", 2, Some(2), text::fn_rept));
        self.register(FunctionDef::eager(
            "SUBSTITUTE",
            3,
            Some(4),
            text::fn_substitute,
        ));
        self.register(FunctionDef::eager("CHAR", 1, Some(1), text::fn_char));
        self.register(FunctionDef::eager("CODE", 1, Some(1), text::fn_code));
        self.register(FunctionDef::eager("VALUE", 1, Some(1), text::fn_value));
        self.register(FunctionDef::eager(
            "NUMBERVALUE",
            1,
            Some(3),
            text::fn_numbervalue,
        ));
        self.register(FunctionDef::eager("T", 1, Some(1), text::fn_t));
        self.register(FunctionDef::eager("N", 1, Some(1), text::fn_n));
    }

    fn register_info_functions(&mut self) {
        self.register(FunctionDef::eager("ISBLANK", 1, Some(1), info::fn_isblank));
        self.register(FunctionDef::eager("ISNUMBER", 1, Some(1), info::fn_isnumber));
        self.register(FunctionDef::eager("ISTEXT", 1, Some(1), info::fn_istext));
        self.register(FunctionDef::eager(
            "ISLOGICAL",
            1,
            Some(1),
            info::fn_islogical,
        ));
        self.register(FunctionDef::eager("ISERROR", 1, Some(1), info::fn_iserror));
        self.register(FunctionDef::eager("ISERR", 1, Some(1), info::fn_iserr));
        self.register(FunctionDef::eager("ISNA", 1, Some(1), info::fn_isna));
        self.register(FunctionDef::eager("NA", 0, Some(0), info::fn_na));
        self.register(FunctionDef::eager(
            "ERROR.TYPE",
            1,
            Some(1),
            info::fn_error_type,
        ));
    }

    fn register_date_functions(&mut self) {
        self.register(FunctionDef::eager("DATE", 3, Some(3), date::fn_date));
        self.register(FunctionDef::eager("TIME", 3, Some(3), date::fn_time));
        self.register(FunctionDef::eager("TODAY", 0, Some(0), date::fn_today).volatile());
        self.register(FunctionDef::eager("NOW", 0, Some(0), date::fn_now).volatile());
        self.register(FunctionDef::eager("YEAR", 1, Some(1), date::fn_year));
        self.register(FunctionDef::eager("MONTH", 1, Some(1), date::fn_month));
        self.register(FunctionDef::eager("DAY", 1, Some(1), date::fn_day));
        self.register(FunctionDef::eager("HOUR", 1, Some(1), date::fn_hour));
        self.register(FunctionDef::eager("MINUTE", 1, Some(1), date::fn_minute));
        self.register(FunctionDef::eager("SECOND", 1, Some(1), date::fn_second));
        self.register(FunctionDef::eager("WEEKDAY", 1, Some(2), date::fn_weekday));
        self.register(FunctionDef::eager("WEEKNUM", 1, Some(2), date::fn_weeknum));
        self.register(FunctionDef::eager("EDATE", 2, Some(2), date::fn_edate));
        self.register(FunctionDef::eager("EOMONTH", 2, Some(2), date::fn_eomonth));
        self.register(FunctionDef::eager("DATEDIF", 3, Some(3), date::fn_datedif));
        self.register(FunctionDef::eager(
            "NETWORKDAYS",
            2,
            Some(3),
            date::fn_networkdays,
        ));
        self.register(FunctionDef::eager("WORKDAY", 2, Some(3), date::fn_workday));
        self.register(FunctionDef::eager(
            "DATEVALUE",
            1,
            Some(1),
            date::fn_datevalue,
        ));
        self.register(FunctionDef::eager(
            "TIMEVALUE",
            1,
            Some(1),
            date::fn_timevalue,
        ));
    }

    fn register_lookup_functions(&mut self) {
        self.register(FunctionDef::eager("VLOOKUP", 3, Some(4), lookup::fn_vlookup));
        self.register(FunctionDef::eager("HLOOKUP", 3, Some(4), lookup::fn_hlookup));
        self.register(FunctionDef::eager("INDEX", 2, Some(3), lookup::fn_index));
        self.register(FunctionDef::eager("MATCH", 2, Some(3), lookup::fn_match));
        self.register(FunctionDef::eager("XLOOKUP", 3, Some(6), lookup::fn_xlookup));
        self.register(FunctionDef::eager("XMATCH", 2, Some(4), lookup::fn_xmatch));
        self.register(FunctionDef::eager("LOOKUP", 2, Some(3), lookup::fn_lookup));
        self.register(FunctionDef::eager("CHOOSE", 2, None, lookup::fn_choose));
        self.register(FunctionDef::eager("OFFSET", 3, Some(5), lookup::fn_offset).volatile());
        self.register(FunctionDef::eager("INDIRECT", 1, Some(2), lookup::fn_indirect).volatile());
    }

    fn register_statistical_functions(&mut self) {
        self.register(FunctionDef::eager("COUNTA", 1, None, statistical::fn_counta));
        self.register(FunctionDef::eager(
            "COUNTBLANK",
            1,
            None,
            statistical::fn_countblank,
        ));
        self.register(FunctionDef::eager(
            "COUNTIF",
            2,
            Some(2),
            statistical::fn_countif,
        ));
        self.register(FunctionDef::eager(
            "AVERAGEIF",
            2,
            Some(3),
            statistical::fn_averageif,
        ));
        self.register(FunctionDef::eager("MEDIAN", 1, None, statistical::fn_median));
        self.register(FunctionDef::eager("LARGE", 2, Some(2), statistical::fn_large));
        self.register(FunctionDef::eager("SMALL", 2, Some(2), statistical::fn_small));
    }

    fn register_financial_functions(&mut self) {
        self.register(FunctionDef::eager("PV", 3, Some(5), financial::fn_pv));
        self.register(FunctionDef::eager("FV", 3, Some(5), financial::fn_fv));
        self.register(FunctionDef::eager("PMT", 3, Some(5), financial::fn_pmt));
        self.register(FunctionDef::eager("NPER", 3, Some(5), financial::fn_nper));
        self.register(FunctionDef::eager("RATE", 3, Some(6), financial::fn_rate));
        self.register(FunctionDef::eager("IPMT", 4, Some(6), financial::fn_ipmt));
        self.register(FunctionDef::eager("PPMT", 4, Some(6), financial::fn_ppmt));
        self.register(FunctionDef::eager("NPV", 2, None, financial::fn_npv));
        self.register(FunctionDef::eager("XNPV", 3, Some(3), financial::fn_xnpv));
        self.register(FunctionDef::eager("IRR", 1, Some(2), financial::fn_irr));
        self.register(FunctionDef::eager("XIRR", 2, Some(3), financial::fn_xirr));
        self.register(FunctionDef::eager("MIRR", 3, Some(3), financial::fn_mirr));
        self.register(FunctionDef::eager(
            "CUMIPMT",
            6,
            Some(6),
            financial::fn_cumipmt,
        ));
        self.register(FunctionDef::eager(
            "CUMPRINC",
            6,
            Some(6),
            financial::fn_cumprinc,
        ));
        self.register(FunctionDef::eager("SLN", 3, Some(3), financial::fn_sln));
        self.register(FunctionDef::eager("SYD", 4, Some(4), financial::fn_syd));
        self.register(FunctionDef::eager("DB", 4, Some(5), financial::fn_db));
        self.register(FunctionDef::eager("DDB", 4, Some(5), financial::fn_ddb));
        self.register(FunctionDef::eager("VDB", 5, Some(7), financial::fn_vdb));
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn check_arg_count(def: &FunctionDef, actual: usize) -> Result<(), FormulaError> {
    if actual < def.min_args {
        return Err(FormulaError::ArgumentCount {
            function: def.name.to_string(),
            expected: format!("at least {}", def.min_args),
            actual,
        });
    }
    if let Some(max) = def.max_args {
        if actual > max {
            return Err(FormulaError::ArgumentCount {
                function: def.name.to_string(),
                expected: format!("at most {}", max),
                actual,
            });
        }
    }
    Ok(())
}

/// Global function registry (lazily initialized)
static REGISTRY: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::new);

/// The shared registry of built-in functions
pub fn registry() -> &'static FunctionRegistry {
    &REGISTRY
}
