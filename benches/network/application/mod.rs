pub mod blynk;
