use super::{spin_fail, spin_ok, Context, EXIT_SUCCESS};
use baton_core::CoreError;

pub fn run(ctx: &Context) -> Result<u8, CoreError> {
    let switcher = ctx.switcher()?;
    let pb = ctx.spinner(&format!("restarting {}...", switcher.controller().app()));
    let report = match switcher.restart() {
        Ok(r) => {
            spin_ok(pb.as_ref(), &r.message());
            r
        }
        Err(e) => {
            spin_fail(pb.as_ref(), "restart failed");
            return Err(e);
        }
    };
    ctx.emit(report, |r| {
        if r.attempts > 1 {
            println!("succeeded on attempt {}", r.attempts);
        }
    })?;
    Ok(EXIT_SUCCESS)
}
