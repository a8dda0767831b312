mod addresses;
mod orders;
mod products;
mod reviews;
mod users;
