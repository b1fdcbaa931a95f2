//! Validates every plan in the plan table as its own test case.
//!
//!   EMUCLICK_PLANS        plan table path (default: plans.json)
//!   EMUCLICK_CHECK_FILES  set to also require template/app paths to exist
//!   EMUCLICK_KEYWORD      value bound to `{keyword}` (default: test)

use std::path::PathBuf;
use std::sync::Arc;

use libtest_mimic::{Arguments, Failed, Trial};

use emuclick_core::plan::{Params, PlanBook};

fn main() {
    let args = Arguments::from_args();

    let path = PathBuf::from(std::env::var("EMUCLICK_PLANS").unwrap_or_else(|_| "plans.json".into()));
    let check_files = std::env::var_os("EMUCLICK_CHECK_FILES").is_some();
    let keyword = std::env::var("EMUCLICK_KEYWORD").unwrap_or_else(|_| "test".into());

    let trials = match PlanBook::load(&path) {
        Ok(book) => {
            let book = Arc::new(book);
            let mut params = Params::new();
            params.insert("keyword".into(), keyword);
            let params = Arc::new(params);

            book.plans
                .iter()
                .map(|plan| {
                    let name = plan.name.clone();
                    let book = Arc::clone(&book);
                    let params = Arc::clone(&params);
                    Trial::test(format!("plan::{}", name), move || {
                        let plan = book.plan(&name).ok_or_else(|| Failed::from("plan vanished"))?;
                        if plan.steps.is_empty() {
                            return Err("plan has no steps".into());
                        }
                        book.validate(plan, &params, check_files)
                            .map_err(|e| Failed::from(e.to_string()))
                    })
                })
                .collect()
        }
        Err(e) => {
            let msg = format!("{:#}", e);
            vec![Trial::test("load", move || Err(msg.into()))]
        }
    };

    libtest_mimic::run(&args, trials).exit();
}
