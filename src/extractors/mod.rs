pub mod kwik;
pub mod pahe_win;
