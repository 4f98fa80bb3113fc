mod conditions;
mod errors;
mod select;
