use crate::error::MetapathError;
use crate::item::Sequence;

pub fn fn_true<N: Clone>() -> Sequence<N> {
    Sequence::boolean(true)
}

pub fn fn_false<N: Clone>() -> Sequence<N> {
    Sequence::boolean(false)
}

pub fn fn_not<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    Ok(Sequence::boolean(!ebv(args)?))
}

pub fn fn_boolean<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    Ok(Sequence::boolean(ebv(args)?))
}

fn ebv<N>(args: &[Sequence<N>]) -> Result<bool, MetapathError> {
    match args.first() {
        Some(arg) => arg.effective_boolean_value(),
        None => Ok(false),
    }
}
