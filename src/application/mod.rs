// Feature encoding, market context, training and prediction
pub mod ml;
